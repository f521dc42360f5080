use byteorder::{BigEndian, ByteOrder};

use crate::scsi::commands::read::{lba6, length6};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct WriteXCommand {
    pub lba: u32,
    /// In blocks
    pub transfer_length: u32,
    /// Force unit access; honoured by flushing once the data is down
    pub fua: bool,
}

impl WriteXCommand {
    pub fn parse6(cdb: &[u8; 16]) -> Self {
        Self {
            lba: lba6(cdb),
            transfer_length: length6(cdb),
            fua: false,
        }
    }

    pub fn parse10(cdb: &[u8; 16]) -> Self {
        Self {
            lba: BigEndian::read_u32(&cdb[2..6]),
            transfer_length: BigEndian::read_u16(&cdb[7..9]) as u32,
            fua: cdb[1] & 0x08 != 0,
        }
    }

    pub fn parse12(cdb: &[u8; 16]) -> Self {
        Self {
            lba: BigEndian::read_u32(&cdb[2..6]),
            transfer_length: BigEndian::read_u32(&cdb[6..10]),
            fua: cdb[1] & 0x08 != 0,
        }
    }
}

#[test]
fn test_write12_parse() {
    let mut data = [0u8; 16];
    data[..12].copy_from_slice(&[0xAA, 0x08, 0, 0, 0x10, 0, 0, 1, 0, 0, 0, 0]);
    let cmd = WriteXCommand::parse12(&data);
    assert_eq!(cmd.lba, 0x1000);
    assert_eq!(cmd.transfer_length, 0x10000);
    assert!(cmd.fua);
}
