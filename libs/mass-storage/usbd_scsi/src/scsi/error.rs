use usbd_bulk_only_transport::Error as BulkOnlyTransportError;

use crate::block_device::BlockDeviceError;
use crate::scsi::{AdditionalSenseCode, SenseData, SenseKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    UnhandledOpCode,
    /// The identified opcode requires more data than was sent
    InsufficientDataForCommand,
    /// A field in the command block holds a value we don't support
    InvalidFieldInCdb,
    /// The host asked for saved mode parameters, which we never keep
    SavingParametersNotSupported,
    BlockDeviceError(BlockDeviceError),
    BulkOnlyTransportError(BulkOnlyTransportError),
}

impl From<BlockDeviceError> for Error {
    fn from(e: BlockDeviceError) -> Error {
        Error::BlockDeviceError(e)
    }
}

impl From<BulkOnlyTransportError> for Error {
    fn from(e: BulkOnlyTransportError) -> Error {
        Error::BulkOnlyTransportError(e)
    }
}

impl Error {
    /// The sense data the host reads back with REQUEST SENSE after this error
    pub fn sense(&self) -> SenseData {
        let (sense_key, additional_sense_code) = match self {
            Error::UnhandledOpCode => (
                SenseKey::IllegalRequest,
                AdditionalSenseCode::InvalidCommandOperationCode,
            ),
            Error::InsufficientDataForCommand => (
                SenseKey::IllegalRequest,
                // Closest thing available. Hosts do very little with ASC/ASCQ, it
                // only has to be unique enough to debug with.
                AdditionalSenseCode::InvalidPacketSize,
            ),
            Error::InvalidFieldInCdb => (
                SenseKey::IllegalRequest,
                AdditionalSenseCode::InvalidFieldInCdb,
            ),
            Error::SavingParametersNotSupported => (
                SenseKey::IllegalRequest,
                AdditionalSenseCode::SavingParametersNotSupported,
            ),
            Error::BlockDeviceError(BlockDeviceError::HardwareError) => (
                SenseKey::HardwareError,
                AdditionalSenseCode::NoAdditionalSenseInformation,
            ),
            Error::BlockDeviceError(BlockDeviceError::ReadError) => (
                SenseKey::MediumError,
                AdditionalSenseCode::UnrecoveredReadError,
            ),
            Error::BlockDeviceError(BlockDeviceError::WriteError) => (
                SenseKey::MediumError,
                AdditionalSenseCode::WriteError,
            ),
            Error::BlockDeviceError(BlockDeviceError::EraseError) => (
                SenseKey::MediumError,
                AdditionalSenseCode::EraseFailure,
            ),
            Error::BlockDeviceError(BlockDeviceError::InvalidAddress) => (
                SenseKey::IllegalRequest,
                AdditionalSenseCode::LogicalBlockAddressOutOfRange,
            ),
            Error::BulkOnlyTransportError(_) => (
                SenseKey::IllegalRequest,
                AdditionalSenseCode::InvalidFieldInCdb,
            ),
        };
        SenseData::new(sense_key, additional_sense_code)
    }
}

#[test]
fn test_error_sense_mapping() {
    assert_eq!(Error::UnhandledOpCode.sense(), SenseData::INVALID_COMMAND);
    assert_eq!(Error::from(BlockDeviceError::WriteError).sense(), SenseData::WRITE_ERROR);
    assert_eq!(
        Error::from(BlockDeviceError::InvalidAddress).sense(),
        SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE
    );
}
