use num_traits::FromPrimitive;

use usbd_bulk_only_transport::CommandBlockWrapper;
use crate::logging::*;
use crate::scsi::{
    commands::*,
    enums::*,
    Error,
};

/// A fully parsed SCSI or ADFU command
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Command {
    Inquiry(InquiryCommand),
    TestUnitReady,
    ReadCapacity,
    ModeSense(ModeSenseXCommand),
    ModeSelect(ModeSelectXCommand),
    PreventAllowMediumRemoval(PreventAllowMediumRemovalCommand),
    RequestSense(RequestSenseCommand),
    Read(ReadXCommand),
    Write(WriteXCommand),
    StartStopUnit(StartStopUnitCommand),
    ReadFormatCapacities(ReadFormatCapacitiesCommand),
    Verify(Verify10Command),
    SynchronizeCache(SynchronizeCache10Command),
    Adfu(AdfuCommand),
    UpgradeSuccess,
}

impl Command {
    pub fn extract_from_cbw(cbw: &CommandBlockWrapper) -> Result<Command, Error> {
        let op_code: OpCode = FromPrimitive::from_u8(cbw.data[0]).ok_or(Error::UnhandledOpCode)?;
        let cdb = checked_cdb(cbw, op_code)?;
        let command = match op_code {
            OpCode::Read6 => Command::Read(ReadXCommand::parse6(cdb)),
            OpCode::Read10 => Command::Read(ReadXCommand::parse10(cdb)),
            OpCode::Read12 => Command::Read(ReadXCommand::parse12(cdb)),
            OpCode::Write6 => Command::Write(WriteXCommand::parse6(cdb)),
            OpCode::Write10 => Command::Write(WriteXCommand::parse10(cdb)),
            OpCode::Write12 => Command::Write(WriteXCommand::parse12(cdb)),
            OpCode::ReadCapacity10 => Command::ReadCapacity,
            OpCode::ReadFormatCapacities => {
                Command::ReadFormatCapacities(ReadFormatCapacitiesCommand::parse(cdb))
            }
            OpCode::Inquiry => Command::Inquiry(InquiryCommand::parse(cdb)),
            OpCode::TestUnitReady => Command::TestUnitReady,
            OpCode::ModeSense6 => Command::ModeSense(ModeSenseXCommand::parse6(cdb)),
            OpCode::ModeSense10 => Command::ModeSense(ModeSenseXCommand::parse10(cdb)),
            OpCode::ModeSelect6 => Command::ModeSelect(ModeSelectXCommand::parse6(cdb)),
            OpCode::ModeSelect10 => Command::ModeSelect(ModeSelectXCommand::parse10(cdb)),
            OpCode::PreventAllowMediumRemoval => {
                Command::PreventAllowMediumRemoval(PreventAllowMediumRemovalCommand::parse(cdb))
            }
            OpCode::RequestSense => Command::RequestSense(RequestSenseCommand::parse(cdb)),
            OpCode::StartStopUnit => Command::StartStopUnit(StartStopUnitCommand::parse(cdb)),
            OpCode::Verify10 => Command::Verify(Verify10Command::parse(cdb)),
            OpCode::SynchronizeCache10 => Command::SynchronizeCache(SynchronizeCache10Command::parse(cdb)),
            OpCode::Adfu => Command::Adfu(AdfuCommand::parse(cdb)?),
            OpCode::UpgradeSuccess => Command::UpgradeSuccess,
        };
        trace_scsi_command!("COMMAND> {:?}", command);
        Ok(command)
    }
}

fn checked_cdb(cbw: &CommandBlockWrapper, op_code: OpCode) -> Result<&[u8; 16], Error> {
    if (cbw.data_length as usize) < op_code.cdb_length() {
        Err(Error::InsufficientDataForCommand)?;
    }
    Ok(&cbw.data)
}

#[cfg(test)]
fn cbw_for(cdb: &[u8]) -> CommandBlockWrapper {
    let mut data = [0u8; 16];
    data[..cdb.len()].copy_from_slice(cdb);
    CommandBlockWrapper {
        tag: 7,
        data_transfer_length: 0,
        direction: usbd_bulk_only_transport::Direction::HostToDevice,
        lun: 0,
        data_length: cdb.len() as u8,
        data,
    }
}

#[test]
fn test_extract_read10() {
    let cbw = cbw_for(&[0x28, 0, 0, 0, 0x1E, 0x80, 0, 0, 0x8, 0]);
    assert_eq!(
        Command::extract_from_cbw(&cbw).unwrap(),
        Command::Read(ReadXCommand { lba: 0x1E80, transfer_length: 8 })
    );
}

#[test]
fn test_extract_short_cdb() {
    let cbw = cbw_for(&[0x28, 0, 0, 0, 0x1E, 0x80]);
    assert_eq!(Command::extract_from_cbw(&cbw), Err(Error::InsufficientDataForCommand));
}

#[test]
fn test_extract_unknown_opcode() {
    let cbw = cbw_for(&[0xA0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(Command::extract_from_cbw(&cbw), Err(Error::UnhandledOpCode));
}

#[test]
fn test_extract_download_image() {
    let cbw = cbw_for(&[0xCC, 0x02, 2, 0, 0, 0, 0x10, 0, 0, 0, 64, 0]);
    assert_eq!(
        Command::extract_from_cbw(&cbw).unwrap(),
        Command::Adfu(AdfuCommand::DownloadImage { partition: 2, sector_offset: 0x10, sector_count: 64 })
    );
}
