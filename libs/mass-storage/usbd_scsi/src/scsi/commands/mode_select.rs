use byteorder::{BigEndian, ByteOrder};

use crate::scsi::commands::CommandLength;

/// MODE SELECT is accepted on the wire but none of our pages are changeable, so
/// the parameter list is read and thrown away and the command is rejected.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModeSelectXCommand {
    pub command_length: CommandLength,
    pub page_format: bool,
    pub save_pages: bool,
    pub parameter_list_length: u16,
}

impl ModeSelectXCommand {
    pub fn parse6(cdb: &[u8; 16]) -> Self {
        Self {
            command_length: CommandLength::C6,
            page_format: cdb[1] & 0x10 != 0,
            save_pages: cdb[1] & 0x01 != 0,
            parameter_list_length: cdb[4] as u16,
        }
    }

    pub fn parse10(cdb: &[u8; 16]) -> Self {
        Self {
            command_length: CommandLength::C10,
            page_format: cdb[1] & 0x10 != 0,
            save_pages: cdb[1] & 0x01 != 0,
            parameter_list_length: BigEndian::read_u16(&cdb[7..9]),
        }
    }
}
