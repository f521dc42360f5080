use byteorder::{ByteOrder, LittleEndian};
use num_traits::FromPrimitive;

use super::CommandStatus;
use crate::Error;

/// Signature that identifies this packet as CSW ("USBS")
pub const CSW_SIGNATURE: u32 = 0x53425355;

/// The status sent on the IN endpoint after the data phase of every
/// command. Little Endian on the wire.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct CommandStatusWrapper {
    /// Tag that matches this CSW back to the CBW that initiated it.
    /// Must be copied from CBW tag field.
    pub tag: u32,
    /// Difference between the expected data length from CBW.data_transfer_length
    /// and the the actual amount of data processed. Cannot be greater
    /// than data_transfer_length.
    pub data_residue: u32,
    /// The status of the command
    pub status: CommandStatus,
}

impl CommandStatusWrapper {
    pub const BYTES: usize = 13;

    pub fn new(tag: u32, data_residue: u32, status: CommandStatus) -> Self {
        Self { tag, data_residue, status }
    }

    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        LittleEndian::write_u32(&mut buf[0..4], CSW_SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], self.tag);
        LittleEndian::write_u32(&mut buf[8..12], self.data_residue);
        buf[12] = self.status as u8;
        buf
    }

    /// Host side decoding, used by tools and tests talking to the device
    pub fn parse(buf: &[u8]) -> Result<CommandStatusWrapper, Error> {
        if buf.len() != Self::BYTES || LittleEndian::read_u32(&buf[0..4]) != CSW_SIGNATURE {
            return Err(Error::InvalidCsw);
        }
        Ok(CommandStatusWrapper {
            tag: LittleEndian::read_u32(&buf[4..8]),
            data_residue: LittleEndian::read_u32(&buf[8..12]),
            status: FromPrimitive::from_u8(buf[12]).ok_or(Error::InvalidCsw)?,
        })
    }
}

#[test]
fn test_csw_layout() {
    let csw = CommandStatusWrapper::new(0x01020304, 256, CommandStatus::PhaseError);
    let bytes = csw.pack();
    assert_eq!(bytes, [b'U', b'S', b'B', b'S', 4, 3, 2, 1, 0, 1, 0, 0, 2]);
    assert_eq!(CommandStatusWrapper::parse(&bytes), Ok(csw));
}

#[test]
fn test_csw_rejects_unknown_status() {
    let mut bytes = CommandStatusWrapper::new(1, 0, CommandStatus::CommandOk).pack();
    bytes[12] = 3;
    assert_eq!(CommandStatusWrapper::parse(&bytes), Err(Error::InvalidCsw));
}
