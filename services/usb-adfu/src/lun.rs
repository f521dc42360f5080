use usbd_scsi::{BlockDevice, BlockDeviceError, SenseData};

use crate::{logging::*, LunConfig};

/// Block size reported for units without a medium
pub(crate) const DEFAULT_BLOCK_BYTES: usize = 512;

/// One logical unit: an optional backing store plus its SCSI state
pub struct LogicalUnit {
    store: Option<Box<dyn BlockDevice>>,
    pub(crate) config: LunConfig,
    /// Reported by the next REQUEST SENSE; cleared by any other command
    pub(crate) sense: SenseData,
    /// Pending unit attention condition, `NO_SENSE` when there is none
    pub(crate) unit_attention: SenseData,
    pub(crate) prevent_medium_removal: bool,
}

impl LogicalUnit {
    pub fn new(store: Box<dyn BlockDevice>, config: LunConfig) -> Self {
        LogicalUnit {
            store: Some(store),
            config,
            sense: SenseData::NO_SENSE,
            unit_attention: SenseData::NO_SENSE,
            prevent_medium_removal: false,
        }
    }

    /// A removable unit with nothing loaded
    pub fn without_medium(config: LunConfig) -> Self {
        LogicalUnit {
            store: None,
            config,
            sense: SenseData::NO_SENSE,
            unit_attention: SenseData::NO_SENSE,
            prevent_medium_removal: false,
        }
    }

    pub fn has_medium(&self) -> bool {
        self.store.is_some()
    }

    pub(crate) fn store(&mut self) -> Option<&mut (dyn BlockDevice + 'static)> {
        self.store.as_deref_mut()
    }

    pub fn block_bytes(&self) -> usize {
        self.store.as_ref().map(|s| s.block_bytes()).unwrap_or(DEFAULT_BLOCK_BYTES)
    }

    pub fn num_blocks(&self) -> u32 {
        self.store.as_ref().map(|s| s.num_blocks()).unwrap_or(0)
    }

    pub(crate) fn set_sense(&mut self, sense: SenseData) {
        trace_sense!("SENSE> {:?} -> {:?}", self.sense, sense);
        self.sense = sense;
    }

    pub(crate) fn flush(&mut self) -> Result<(), BlockDeviceError> {
        match self.store.as_mut() {
            Some(store) => store.flush(),
            None => Ok(()),
        }
    }

    /// Flush and drop the backing store
    pub(crate) fn eject(&mut self) -> Result<(), BlockDeviceError> {
        self.flush()?;
        self.store = None;
        Ok(())
    }

    /// Forget per-command state after an exception
    pub(crate) fn clear_transient(&mut self) {
        self.sense = SenseData::NO_SENSE;
        self.unit_attention = SenseData::NO_SENSE;
        self.prevent_medium_removal = false;
    }
}
