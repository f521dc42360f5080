#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDeviceError {
    /// Hardware didn't behave as expected, unrecoverable
    HardwareError,

    /// Error during reading; the medium could not return the requested blocks
    ReadError,

    /// Error during writing; most likely value read back after write was wrong
    WriteError,

    /// Error during erase; most likely value read back after erase was wrong
    EraseError,

    /// Address is invalid or out of range
    InvalidAddress,
}

/// Backing storage for one logical unit.
///
/// Buffers handed to `read_blocks`/`write_blocks` are always a whole number of
/// blocks long; `lba` addresses the first of them.
pub trait BlockDevice: Send {
    /// The number of bytes per block
    fn block_bytes(&self) -> usize;

    /// Number of addressable blocks
    fn num_blocks(&self) -> u32;

    /// Read `blocks.len() / block_bytes()` blocks starting at `lba`
    fn read_blocks(&mut self, lba: u32, blocks: &mut [u8]) -> Result<(), BlockDeviceError>;

    /// Write the `blocks` buffer starting at the block indicated by `lba`
    fn write_blocks(&mut self, lba: u32, blocks: &[u8]) -> Result<(), BlockDeviceError>;

    /// Push anything cached out to the medium
    fn flush(&mut self) -> Result<(), BlockDeviceError> { Ok(()) }

    /// Get the maxium valid lba (logical block address)
    fn max_lba(&self) -> u32 { self.num_blocks().saturating_sub(1) }

    /// True if `blocks` blocks starting at `lba` are all addressable
    fn contains(&self, lba: u32, blocks: u32) -> bool {
        (lba as u64) + (blocks as u64) <= self.num_blocks() as u64
    }
}
