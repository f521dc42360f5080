use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct Verify10Command {
    /// Byte-compare against data sent by the host; not supported
    pub byte_check: bool,
    pub lba: u32,
    pub verification_length: u16,
}

impl Verify10Command {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self {
            byte_check: cdb[1] & 0x02 != 0,
            lba: BigEndian::read_u32(&cdb[2..6]),
            verification_length: BigEndian::read_u16(&cdb[7..9]),
        }
    }
}
