// There are many more variants (see asc-num.txt) but these are the ones the scsi code
// and the flashing commands use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdditionalSenseCode {
    /// ASC 0x0, ASCQ: 0x0 - NO ADDITIONAL SENSE INFORMATION
    NoAdditionalSenseInformation,
    /// ASC 0x8, ASCQ: 0x0 - LOGICAL UNIT COMMUNICATION FAILURE
    LogicalUnitCommunicationFailure,
    /// ASC 0x8, ASCQ: 0x1 - LOGICAL UNIT COMMUNICATION TIME-OUT
    LogicalUnitCommunicationTimeout,
    /// ASC 0xC, ASCQ: 0x0 - WRITE ERROR
    WriteError,
    /// ASC 0x11, ASCQ: 0x0 - UNRECOVERED READ ERROR
    UnrecoveredReadError,
    /// ASC 0x1D, ASCQ: 0x0 - MISCOMPARE DURING VERIFY OPERATION
    MiscompareDuringVerifyOperation,
    /// ASC 0x20, ASCQ: 0x0 - INVALID COMMAND OPERATION CODE
    InvalidCommandOperationCode,
    /// ASC 0x21, ASCQ: 0x0 - LOGICAL BLOCK ADDRESS OUT OF RANGE
    LogicalBlockAddressOutOfRange,
    /// ASC 0x24, ASCQ: 0x0 - INVALID FIELD IN CDB
    InvalidFieldInCdb,
    /// ASC 0x25, ASCQ: 0x0 - LOGICAL UNIT NOT SUPPORTED
    LogicalUnitNotSupported,
    /// ASC 0x27, ASCQ: 0x0 - WRITE PROTECTED
    WriteProtected,
    /// ASC 0x28, ASCQ: 0x0 - NOT READY TO READY CHANGE, MEDIUM MAY HAVE CHANGED
    NotReadyToReadyChange,
    /// ASC 0x29, ASCQ: 0x0 - POWER ON, RESET, OR BUS DEVICE RESET OCCURRED
    ResetOccurred,
    /// ASC 0x31, ASCQ: 0x1 - FORMAT COMMAND FAILED
    FormatCommandFailed,
    /// ASC 0x39, ASCQ: 0x0 - SAVING PARAMETERS NOT SUPPORTED
    SavingParametersNotSupported,
    /// ASC 0x3A, ASCQ: 0x0 - MEDIUM NOT PRESENT
    MediumNotPresent,
    /// ASC 0x51, ASCQ: 0x0 - ERASE FAILURE
    EraseFailure,
    /// ASC 0x53, ASCQ: 0x2 - MEDIUM REMOVAL PREVENTED
    MediumRemovalPrevented,
    /// ASC 0x64, ASCQ: 0x1 - INVALID PACKET SIZE
    InvalidPacketSize,
}

impl AdditionalSenseCode {
    /// Returns the ASC code for this variant
    pub fn asc(&self) -> u8 {
        match self {
            AdditionalSenseCode::NoAdditionalSenseInformation => 0x00,
            AdditionalSenseCode::LogicalUnitCommunicationFailure => 0x08,
            AdditionalSenseCode::LogicalUnitCommunicationTimeout => 0x08,
            AdditionalSenseCode::WriteError => 0x0C,
            AdditionalSenseCode::UnrecoveredReadError => 0x11,
            AdditionalSenseCode::MiscompareDuringVerifyOperation => 0x1D,
            AdditionalSenseCode::InvalidCommandOperationCode => 0x20,
            AdditionalSenseCode::LogicalBlockAddressOutOfRange => 0x21,
            AdditionalSenseCode::InvalidFieldInCdb => 0x24,
            AdditionalSenseCode::LogicalUnitNotSupported => 0x25,
            AdditionalSenseCode::WriteProtected => 0x27,
            AdditionalSenseCode::NotReadyToReadyChange => 0x28,
            AdditionalSenseCode::ResetOccurred => 0x29,
            AdditionalSenseCode::FormatCommandFailed => 0x31,
            AdditionalSenseCode::SavingParametersNotSupported => 0x39,
            AdditionalSenseCode::MediumNotPresent => 0x3A,
            AdditionalSenseCode::EraseFailure => 0x51,
            AdditionalSenseCode::MediumRemovalPrevented => 0x53,
            AdditionalSenseCode::InvalidPacketSize => 0x64,
        }
    }
    /// Returns the ASCQ code for this variant
    pub fn ascq(&self) -> u8 {
        match self {
            AdditionalSenseCode::LogicalUnitCommunicationTimeout => 0x01,
            AdditionalSenseCode::FormatCommandFailed => 0x01,
            AdditionalSenseCode::MediumRemovalPrevented => 0x02,
            AdditionalSenseCode::InvalidPacketSize => 0x01,
            _ => 0x00,
        }
    }
    /// Looks up the variant for an ASC/ASCQ pair
    pub fn from(asc: u8, ascq: u8) -> Option<Self> {
        use AdditionalSenseCode::*;
        [
            NoAdditionalSenseInformation,
            LogicalUnitCommunicationFailure,
            LogicalUnitCommunicationTimeout,
            WriteError,
            UnrecoveredReadError,
            MiscompareDuringVerifyOperation,
            InvalidCommandOperationCode,
            LogicalBlockAddressOutOfRange,
            InvalidFieldInCdb,
            LogicalUnitNotSupported,
            WriteProtected,
            NotReadyToReadyChange,
            ResetOccurred,
            FormatCommandFailed,
            SavingParametersNotSupported,
            MediumNotPresent,
            EraseFailure,
            MediumRemovalPrevented,
            InvalidPacketSize,
        ]
        .into_iter()
        .find(|c| c.asc() == asc && c.ascq() == ascq)
    }
}

impl Default for AdditionalSenseCode {
    fn default() -> Self {
        AdditionalSenseCode::NoAdditionalSenseInformation
    }
}

#[test]
fn test_asc_lookup() {
    assert_eq!(AdditionalSenseCode::from(0x29, 0), Some(AdditionalSenseCode::ResetOccurred));
    assert_eq!(
        AdditionalSenseCode::from(0x08, 1),
        Some(AdditionalSenseCode::LogicalUnitCommunicationTimeout)
    );
    assert_eq!(AdditionalSenseCode::from(0x08, 7), None);
}
