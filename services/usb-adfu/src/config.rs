use std::time::Duration;

use usbd_bulk_only_transport::MAX_LUNS;

/// Default number of transfer buffers in the ring
pub const DEFAULT_BUFFER_COUNT: usize = 2;
/// Default size of one transfer buffer
pub const DEFAULT_BUFFER_BYTES: usize = 16 * 1024;
/// High speed bulk max packet size
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// What to do with the device once an upgrade was declared successful and the
/// host goes away
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostUpgradeAction {
    Halt,
    Reboot,
    Nothing,
}

/// Platform hook for the post-upgrade action
pub trait PowerControl: Send {
    fn halt(&mut self);
    fn reboot(&mut self);
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of transfer buffers; bounds the wire transfers in flight
    pub buffer_count: usize,
    /// Size of each transfer buffer, a multiple of the max packet size and of
    /// every LUN's block size
    pub buffer_bytes: usize,
    pub max_packet_size: usize,
    /// Class requests addressed to other interfaces are not ours
    pub interface_number: u8,
    pub vendor_identification: String,
    pub product_identification: String,
    pub product_revision_level: String,
    /// The logical unit that accepts the ADFU vendor commands
    pub adfu_lun: u8,
    pub post_upgrade_action: PostUpgradeAction,
    pub phase_poll_interval: Duration,
    pub phase_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            buffer_count: DEFAULT_BUFFER_COUNT,
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            interface_number: 0,
            vendor_identification: "Actions".to_string(),
            product_identification: "ADFU Storage".to_string(),
            product_revision_level: "0100".to_string(),
            adfu_lun: 0,
            post_upgrade_action: PostUpgradeAction::Reboot,
            phase_poll_interval: Duration::from_millis(50),
            phase_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub(crate) fn validate(&self, luns: usize) -> Result<(), crate::Error> {
        use crate::Error::InvalidConfig;
        if self.buffer_count < 2 {
            return Err(InvalidConfig("need at least two transfer buffers"));
        }
        if self.max_packet_size == 0
            || self.buffer_bytes == 0
            || self.buffer_bytes % self.max_packet_size != 0
        {
            return Err(InvalidConfig("buffer size must be a non-zero multiple of the max packet size"));
        }
        if luns == 0 || luns > MAX_LUNS as usize {
            return Err(InvalidConfig("between 1 and 16 logical units are supported"));
        }
        if self.adfu_lun as usize >= luns {
            return Err(InvalidConfig("ADFU LUN does not exist"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LunConfig {
    pub read_only: bool,
    /// Removable units accept PREVENT ALLOW MEDIUM REMOVAL and eject
    pub removable: bool,
}

/// One raw partition on the ADFU logical unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: u8,
    pub start_lba: u32,
    pub blocks: u32,
}

impl Partition {
    pub fn end_lba(&self) -> u64 {
        self.start_lba as u64 + self.blocks as u64
    }

    fn overlaps(&self, other: &Partition) -> bool {
        (self.start_lba as u64) < other.end_lba() && (other.start_lba as u64) < self.end_lba()
    }
}

/// Partition layout used by download-image, format and the consistency query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionTable {
    entries: Vec<Partition>,
}

impl PartitionTable {
    pub fn new(entries: Vec<Partition>) -> Self {
        PartitionTable { entries }
    }

    pub fn get(&self, index: u8) -> Option<&Partition> {
        self.entries.iter().find(|p| p.index == index)
    }

    /// Number of partitions that are empty, run past `num_blocks`, overlap an
    /// earlier entry or reuse its index
    pub fn inconsistencies(&self, num_blocks: u32) -> u32 {
        let mut bad = 0;
        for (i, p) in self.entries.iter().enumerate() {
            let clashes =
                self.entries[..i].iter().any(|q| q.index == p.index || (p.blocks > 0 && q.overlaps(p)));
            if p.blocks == 0 || p.end_lba() > num_blocks as u64 || clashes {
                bad += 1;
            }
        }
        bad
    }
}
