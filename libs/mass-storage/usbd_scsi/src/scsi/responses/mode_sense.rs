use byteorder::{BigEndian, ByteOrder};

use crate::scsi::{
    commands::{CommandLength, ModeSenseXCommand},
    enums::{PageControl, PAGE_CODE_ALL, PAGE_CODE_CACHING},
    Error,
};

const CACHING_PAGE_LENGTH: usize = 0x12;
/// Device specific parameter, write protect
const DSP_WP: u8 = 0x80;

/// Builds the MODE SENSE(6/10) parameter data: header, no block descriptors,
/// and the caching page when asked for it.
pub fn mode_sense_response(cmd: &ModeSenseXCommand, write_protected: bool) -> Result<Vec<u8>, Error> {
    if cmd.page_control == PageControl::SavedValues {
        return Err(Error::SavingParametersNotSupported);
    }
    if cmd.subpage_code != 0 {
        return Err(Error::InvalidFieldInCdb);
    }
    let header_len = match cmd.command_length {
        CommandLength::C6 => 4,
        _ => 8,
    };
    let mut buf = vec![0u8; header_len];

    match cmd.page_code {
        PAGE_CODE_CACHING | PAGE_CODE_ALL => {
            let mut page = [0u8; 2 + CACHING_PAGE_LENGTH];
            page[0] = PAGE_CODE_CACHING;
            page[1] = CACHING_PAGE_LENGTH as u8;
            // nothing is changeable, so only current/default values carry bits
            if cmd.page_control != PageControl::ChangeableValues {
                // write cache enabled
                page[2] = 0x04;
                BigEndian::write_u16(&mut page[4..6], 0xFFFF);
                BigEndian::write_u16(&mut page[8..10], 0xFFFF);
                BigEndian::write_u16(&mut page[10..12], 0xFFFF);
            }
            buf.extend_from_slice(&page);
        }
        _ => return Err(Error::InvalidFieldInCdb),
    }

    let dsp = if write_protected { DSP_WP } else { 0 };
    match cmd.command_length {
        CommandLength::C6 => {
            buf[0] = (buf.len() - 1) as u8;
            buf[2] = dsp;
        }
        _ => {
            let len = (buf.len() - 2) as u16;
            BigEndian::write_u16(&mut buf[0..2], len);
            buf[3] = dsp;
        }
    }
    Ok(buf)
}

#[cfg(test)]
fn cmd(command_length: CommandLength, page_control: PageControl, page_code: u8) -> ModeSenseXCommand {
    ModeSenseXCommand {
        command_length,
        disable_block_descriptors: false,
        page_control,
        page_code,
        subpage_code: 0,
        allocation_length: 0xFF,
    }
}

#[test]
fn test_mode_sense6_caching() {
    let bytes = mode_sense_response(&cmd(CommandLength::C6, PageControl::CurrentValues, 0x3F), true).unwrap();
    assert_eq!(bytes.len(), 4 + 20);
    assert_eq!(bytes[0] as usize, bytes.len() - 1);
    assert_eq!(bytes[2], 0x80);
    assert_eq!(bytes[4], 0x08);
    assert_eq!(bytes[6], 0x04);
}

#[test]
fn test_mode_sense10_header() {
    let changeable = cmd(CommandLength::C10, PageControl::ChangeableValues, 0x08);
    let bytes = mode_sense_response(&changeable, false).unwrap();
    assert_eq!(bytes.len(), 8 + 20);
    assert_eq!(BigEndian::read_u16(&bytes[0..2]) as usize, bytes.len() - 2);
    assert_eq!(bytes[3], 0);
    assert_eq!(bytes[10], 0);
}

#[test]
fn test_mode_sense_rejects() {
    assert_eq!(
        mode_sense_response(&cmd(CommandLength::C6, PageControl::SavedValues, 0x08), false),
        Err(Error::SavingParametersNotSupported)
    );
    assert_eq!(
        mode_sense_response(&cmd(CommandLength::C6, PageControl::CurrentValues, 0x1C), false),
        Err(Error::InvalidFieldInCdb)
    );
}
