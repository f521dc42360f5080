#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Wrong length or signature; the transaction cannot be answered with a CSW
    InvalidCbw,
    /// Signature and length are fine but the flags, LUN or CDB length are not
    MeaninglessCbw,
    /// A status wrapper with the wrong length or signature (host side parsing)
    InvalidCsw,
    /// A class request addressed to our interface with illegal wValue/wLength
    InvalidRequest,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidCbw => write!(f, "invalid CBW"),
            Error::MeaninglessCbw => write!(f, "non-meaningful CBW"),
            Error::InvalidCsw => write!(f, "invalid CSW"),
            Error::InvalidRequest => write!(f, "invalid class request"),
        }
    }
}
