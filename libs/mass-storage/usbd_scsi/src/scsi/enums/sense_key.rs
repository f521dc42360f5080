#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum SenseKey {
    /// Nothing to report, the previous command succeeded
    NoSense = 0x0,
    /// Completed, with some recovery action performed by the device server
    RecoveredError = 0x1,
    /// The logical unit is not accessible, e.g. no medium
    NotReady = 0x2,
    /// Non-recovered error probably caused by a flaw in the medium
    MediumError = 0x3,
    /// Non-recoverable hardware failure, including loss of the link to the unit
    HardwareError = 0x4,
    /// Illegal parameter in the CDB or the parameter data, or an unsupported LUN
    IllegalRequest = 0x5,
    /// A unit attention condition has been established, e.g. a reset occurred
    UnitAttention = 0x6,
    /// A write was attempted on a protected medium
    DataProtect = 0x7,
    BlankCheck = 0x8,
    VendorSpecific = 0x9,
    CopyAborted = 0xA,
    /// The device server aborted the command; the host may retry
    AbortedCommand = 0xB,
    VolumeOverflow = 0xD,
    /// The source data did not match the data read from the medium
    Miscompare = 0xE,
    Completed = 0xF,
}

impl Default for SenseKey {
    fn default() -> Self {
        SenseKey::NoSense
    }
}
