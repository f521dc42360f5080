use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ReadXCommand {
    pub lba: u32,
    /// In blocks
    pub transfer_length: u32,
}

impl ReadXCommand {
    pub fn parse6(cdb: &[u8; 16]) -> Self {
        Self {
            lba: lba6(cdb),
            transfer_length: length6(cdb),
        }
    }

    pub fn parse10(cdb: &[u8; 16]) -> Self {
        Self {
            lba: BigEndian::read_u32(&cdb[2..6]),
            transfer_length: BigEndian::read_u16(&cdb[7..9]) as u32,
        }
    }

    pub fn parse12(cdb: &[u8; 16]) -> Self {
        Self {
            lba: BigEndian::read_u32(&cdb[2..6]),
            transfer_length: BigEndian::read_u32(&cdb[6..10]),
        }
    }
}

/// 21 bit lba of the 6 byte READ/WRITE layout
pub(crate) fn lba6(cdb: &[u8; 16]) -> u32 {
    ((cdb[1] as u32 & 0x1F) << 16) | BigEndian::read_u16(&cdb[2..4]) as u32
}

/// A transfer length of 0 in a 6 byte READ/WRITE means 256 blocks
pub(crate) fn length6(cdb: &[u8; 16]) -> u32 {
    if cdb[4] == 0 { 256 } else { cdb[4] as u32 }
}

#[test]
fn test_read10_parse() {
    let mut data = [0u8; 16];
    data[..10].copy_from_slice(&[0x28, 0, 0, 0, 0x1E, 0x80, 0, 0, 0x8, 0]);
    let cmd = ReadXCommand::parse10(&data);
    assert_eq!(cmd.lba, 0x1E80);
    assert_eq!(cmd.transfer_length, 8);
}

#[test]
fn test_read6_parse() {
    let mut data = [0u8; 16];
    data[..6].copy_from_slice(&[0x08, 0xE1, 0x02, 0x03, 0, 0]);
    let cmd = ReadXCommand::parse6(&data);
    assert_eq!(cmd.lba, 0x010203);
    assert_eq!(cmd.transfer_length, 256);
}
