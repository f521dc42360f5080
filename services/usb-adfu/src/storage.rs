use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use usbd_scsi::{BlockDevice, BlockDeviceError};

/// Raw RAM staging used by the ADFU access-RAM command
pub trait RamStage: Send {
    /// Copy `data` to `offset` bytes into region `region`
    fn write_blob(&mut self, region: u8, offset: u32, data: &[u8]) -> Result<(), BlockDeviceError>;
}

/// RAM backed block device. Clones share the same blocks, so a test (or a
/// second owner) can look at what the engine wrote.
#[derive(Clone)]
pub struct RamDisk {
    block_bytes: usize,
    data: Arc<Mutex<Vec<u8>>>,
}

impl RamDisk {
    pub fn new(block_bytes: usize, num_blocks: u32) -> Self {
        RamDisk {
            block_bytes,
            data: Arc::new(Mutex::new(vec![0u8; block_bytes * num_blocks as usize])),
        }
    }

    /// Copy of `blocks` blocks starting at `lba`
    pub fn snapshot(&self, lba: u32, blocks: u32) -> Vec<u8> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let start = (lba as usize * self.block_bytes).min(data.len());
        let end = (start + blocks as usize * self.block_bytes).min(data.len());
        data[start..end].to_vec()
    }

    fn range(&self, lba: u32, len: usize) -> Result<std::ops::Range<usize>, BlockDeviceError> {
        if len % self.block_bytes != 0 || !self.contains(lba, (len / self.block_bytes) as u32) {
            return Err(BlockDeviceError::InvalidAddress);
        }
        let start = lba as usize * self.block_bytes;
        Ok(start..start + len)
    }
}

impl BlockDevice for RamDisk {
    fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    fn num_blocks(&self) -> u32 {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        (data.len() / self.block_bytes) as u32
    }

    fn read_blocks(&mut self, lba: u32, blocks: &mut [u8]) -> Result<(), BlockDeviceError> {
        let range = self.range(lba, blocks.len())?;
        let data = self.data.lock().map_err(|_| BlockDeviceError::HardwareError)?;
        blocks.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_blocks(&mut self, lba: u32, blocks: &[u8]) -> Result<(), BlockDeviceError> {
        let range = self.range(lba, blocks.len())?;
        let mut data = self.data.lock().map_err(|_| BlockDeviceError::HardwareError)?;
        data[range].copy_from_slice(blocks);
        Ok(())
    }
}

/// Named RAM regions of fixed size. Clones share the regions.
#[derive(Clone, Default)]
pub struct RamRegions {
    regions: Arc<Mutex<HashMap<u8, Vec<u8>>>>,
}

impl RamRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&self, region: u8, bytes: usize) {
        let mut regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        regions.insert(region, vec![0u8; bytes]);
    }

    pub fn contents(&self, region: u8) -> Option<Vec<u8>> {
        let regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        regions.get(&region).cloned()
    }
}

impl RamStage for RamRegions {
    fn write_blob(&mut self, region: u8, offset: u32, data: &[u8]) -> Result<(), BlockDeviceError> {
        let mut regions = self.regions.lock().map_err(|_| BlockDeviceError::HardwareError)?;
        let target = regions.get_mut(&region).ok_or(BlockDeviceError::InvalidAddress)?;
        let start = offset as usize;
        let end = start.checked_add(data.len()).ok_or(BlockDeviceError::InvalidAddress)?;
        if end > target.len() {
            return Err(BlockDeviceError::InvalidAddress);
        }
        target[start..end].copy_from_slice(data);
        Ok(())
    }
}
