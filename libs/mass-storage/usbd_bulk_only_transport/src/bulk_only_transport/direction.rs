use crate::Error;

/// Bit 7 of the CBW flags byte; every other bit is reserved
const FLAG_IN: u8 = 0x80;

/// The direction of a data transfer
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum Direction {
    /// Host to device, OUT in USB parlance
    HostToDevice = 0x00,
    /// Device to host, IN in USB parlance
    DeviceToHost = 0x80,
}

impl Direction {
    /// Decodes the CBW flags byte. Reserved bits must be zero.
    pub fn from_flags(flags: u8) -> Result<Direction, Error> {
        if flags & !FLAG_IN != 0 {
            return Err(Error::MeaninglessCbw);
        }
        Ok(if flags & FLAG_IN != 0 { Direction::DeviceToHost } else { Direction::HostToDevice })
    }

    pub fn flags(&self) -> u8 { *self as u8 }
}

#[test]
fn test_reserved_flag_bits() {
    assert_eq!(Direction::from_flags(0x80), Ok(Direction::DeviceToHost));
    assert_eq!(Direction::from_flags(0x00), Ok(Direction::HostToDevice));
    assert_eq!(Direction::from_flags(0x81), Err(Error::MeaninglessCbw));
    assert_eq!(Direction::from_flags(0x40), Err(Error::MeaninglessCbw));
}
