/// Sub-opcodes of the ADFU vendor family, CDB byte 1
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum AdfuSubOpCode {
    /// Stage a blob into a named RAM region
    AccessRam = 0x01,
    /// Stream sectors into a partition
    DownloadImage = 0x02,
    /// Run a consistency or checksum check and report the outcome
    QueryInfo = 0x03,
    /// Advance the install phase shared with userspace
    TransferOver = 0x04,
    /// Ask the userspace installer to format a partition
    Format = 0x05,
}

/// What a QUERY INFO command checks, CDB byte 2
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum QuerySelector {
    PartitionConsistency = 0x01,
    ImageChecksum = 0x02,
}

/// Which part of the install a TRANSFER OVER closes, CDB byte 2
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum TransferStage {
    /// All RAM blobs are staged
    RamStaged = 0x00,
    /// All partitions are written
    PartitionsWritten = 0x01,
    /// The install is over, userspace must confirm
    Finished = 0x02,
}
