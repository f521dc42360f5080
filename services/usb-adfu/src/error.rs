use usbd_bulk_only_transport::Error as BulkOnlyTransportError;
use usbd_scsi::{BlockDeviceError, Error as ScsiError};

use crate::AdfuPhase;

#[derive(Debug)]
pub enum Error {
    /// An exception is pending; whatever the worker was doing is abandoned
    Interrupted,
    /// The worker's completion or doorbell channel went away
    ChannelClosed,
    InvalidConfig(&'static str),
    Transport(BulkOnlyTransportError),
    Scsi(ScsiError),
    Storage(BlockDeviceError),
    Io(std::io::Error),
    /// The userspace installer did not reach the phase in time
    PhaseTimeout(AdfuPhase),
    /// The userspace installer reported `failed`
    PhaseFailed,
    WorkerPanicked,
}

impl From<BulkOnlyTransportError> for Error {
    fn from(e: BulkOnlyTransportError) -> Error {
        Error::Transport(e)
    }
}

impl From<ScsiError> for Error {
    fn from(e: ScsiError) -> Error {
        Error::Scsi(e)
    }
}

impl From<BlockDeviceError> for Error {
    fn from(e: BlockDeviceError) -> Error {
        Error::Storage(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Interrupted => write!(f, "interrupted by a pending exception"),
            Error::ChannelClosed => write!(f, "worker channel closed"),
            Error::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Scsi(e) => write!(f, "scsi error: {:?}", e),
            Error::Storage(e) => write!(f, "storage error: {:?}", e),
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::PhaseTimeout(phase) => write!(f, "timed out waiting for phase {}", phase.name()),
            Error::PhaseFailed => write!(f, "installer reported failure"),
            Error::WorkerPanicked => write!(f, "worker thread panicked"),
        }
    }
}

impl std::error::Error for Error {}
