use byteorder::{BigEndian, ByteOrder};

use crate::scsi::{
    commands::CommandLength,
    enums::PageControl,
};

/* After a logical unit reset, the device server shall respond in the following manner:
a) if default values are requested, report the default values;
b) if saved values are requested, report valid restored mode parameters, or restore the mode parameters and
report them. If saved parameters are not implemented, respond as defined in 6.11.5; or
c) if current values are requested and the current values have been sent by the application client via a MODE
SELECT command, the current values shall be returned. If the current values have not been sent, the
device server shall return the default values.
*/

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModeSenseXCommand {
    pub command_length: CommandLength,
    pub disable_block_descriptors: bool,
    pub page_control: PageControl,
    pub page_code: u8,
    pub subpage_code: u8,
    pub allocation_length: u16,
}

impl ModeSenseXCommand {
    pub fn parse6(cdb: &[u8; 16]) -> Self {
        Self {
            command_length: CommandLength::C6,
            disable_block_descriptors: cdb[1] & 0x08 != 0,
            page_control: PageControl::from_cdb_byte(cdb[2]),
            page_code: cdb[2] & 0x3F,
            subpage_code: cdb[3],
            allocation_length: cdb[4] as u16,
        }
    }

    pub fn parse10(cdb: &[u8; 16]) -> Self {
        Self {
            command_length: CommandLength::C10,
            disable_block_descriptors: cdb[1] & 0x08 != 0,
            page_control: PageControl::from_cdb_byte(cdb[2]),
            page_code: cdb[2] & 0x3F,
            subpage_code: cdb[3],
            allocation_length: BigEndian::read_u16(&cdb[7..9]),
        }
    }
}

#[test]
fn test_mode_sense6_parse() {
    let mut data = [0u8; 16];
    data[..6].copy_from_slice(&[0x1A, 0x08, 0xC8, 0, 0xC0, 0]);
    let cmd = ModeSenseXCommand::parse6(&data);
    assert_eq!(cmd.page_control, PageControl::SavedValues);
    assert_eq!(cmd.page_code, 0x08);
    assert!(cmd.disable_block_descriptors);
    assert_eq!(cmd.allocation_length, 0xC0);
}
