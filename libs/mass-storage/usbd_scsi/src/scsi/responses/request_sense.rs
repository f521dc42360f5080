use byteorder::{BigEndian, ByteOrder};

use crate::scsi::enums::{AdditionalSenseCode, SenseKey};

/// Sense information kept per logical unit and reported by REQUEST SENSE
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct SenseData {
    pub key: SenseKey,
    pub code: AdditionalSenseCode,
    /// Command specific information, e.g. the failing lba
    pub information: Option<u32>,
}

impl SenseData {
    pub const NO_SENSE: SenseData =
        SenseData::new(SenseKey::NoSense, AdditionalSenseCode::NoAdditionalSenseInformation);
    pub const COMMUNICATION_FAILURE: SenseData =
        SenseData::new(SenseKey::HardwareError, AdditionalSenseCode::LogicalUnitCommunicationFailure);
    pub const COMMUNICATION_TIMEOUT: SenseData =
        SenseData::new(SenseKey::HardwareError, AdditionalSenseCode::LogicalUnitCommunicationTimeout);
    pub const INVALID_COMMAND: SenseData =
        SenseData::new(SenseKey::IllegalRequest, AdditionalSenseCode::InvalidCommandOperationCode);
    pub const INVALID_FIELD_IN_CDB: SenseData =
        SenseData::new(SenseKey::IllegalRequest, AdditionalSenseCode::InvalidFieldInCdb);
    pub const LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE: SenseData =
        SenseData::new(SenseKey::IllegalRequest, AdditionalSenseCode::LogicalBlockAddressOutOfRange);
    pub const LOGICAL_UNIT_NOT_SUPPORTED: SenseData =
        SenseData::new(SenseKey::IllegalRequest, AdditionalSenseCode::LogicalUnitNotSupported);
    pub const MEDIUM_NOT_PRESENT: SenseData =
        SenseData::new(SenseKey::NotReady, AdditionalSenseCode::MediumNotPresent);
    pub const MEDIUM_REMOVAL_PREVENTED: SenseData =
        SenseData::new(SenseKey::IllegalRequest, AdditionalSenseCode::MediumRemovalPrevented);
    pub const RESET_OCCURRED: SenseData =
        SenseData::new(SenseKey::UnitAttention, AdditionalSenseCode::ResetOccurred);
    pub const UNRECOVERED_READ_ERROR: SenseData =
        SenseData::new(SenseKey::MediumError, AdditionalSenseCode::UnrecoveredReadError);
    pub const WRITE_ERROR: SenseData = SenseData::new(SenseKey::MediumError, AdditionalSenseCode::WriteError);
    pub const WRITE_PROTECTED: SenseData =
        SenseData::new(SenseKey::DataProtect, AdditionalSenseCode::WriteProtected);
    pub const MISCOMPARE: SenseData =
        SenseData::new(SenseKey::Miscompare, AdditionalSenseCode::MiscompareDuringVerifyOperation);
    pub const FORMAT_FAILED: SenseData =
        SenseData::new(SenseKey::MediumError, AdditionalSenseCode::FormatCommandFailed);

    pub const BYTES: usize = 18;

    pub const fn new(key: SenseKey, code: AdditionalSenseCode) -> Self {
        Self { key, code, information: None }
    }

    pub fn with_information(mut self, information: u32) -> Self {
        self.information = Some(information);
        self
    }

    pub fn is_no_sense(&self) -> bool {
        self.key == SenseKey::NoSense
    }

    /// Fixed format sense data (SPC-3 4.5.3)
    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        buf[0] = 0x70;
        if let Some(information) = self.information {
            buf[0] |= 0x80;
            BigEndian::write_u32(&mut buf[3..7], information);
        }
        buf[2] = self.key as u8;
        // additional sense length
        buf[7] = (Self::BYTES - 8) as u8;
        buf[12] = self.code.asc();
        buf[13] = self.code.ascq();
        buf
    }
}

#[test]
fn test_sense_pack() {
    let bytes = SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(0x1234).pack();
    assert_eq!(bytes[0], 0xF0);
    assert_eq!(bytes[2], 0x05);
    assert_eq!(&bytes[3..7], &[0, 0, 0x12, 0x34]);
    assert_eq!(bytes[7], 10);
    assert_eq!(bytes[12], 0x21);
    assert_eq!(bytes[13], 0);

    let bytes = SenseData::NO_SENSE.pack();
    assert_eq!(bytes[0], 0x70);
    assert!(bytes[1..].iter().enumerate().all(|(i, b)| *b == 0 || i == 6));
}
