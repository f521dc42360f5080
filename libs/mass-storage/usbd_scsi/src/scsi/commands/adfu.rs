use byteorder::{BigEndian, ByteOrder};
use num_traits::FromPrimitive;

use crate::scsi::{
    enums::{AdfuSubOpCode, QuerySelector, TransferStage},
    Error,
};

/// One command of the ADFU vendor family (op code 0xCC). The sub-op code sits in
/// CDB byte 1; every parameter after it is big endian.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum AdfuCommand {
    /// `length` bytes at `offset` of RAM region `region` follow in the data phase
    AccessRam { region: u8, offset: u32, length: u32 },
    /// `sector_count` blocks at `sector_offset` within partition `partition` follow
    DownloadImage { partition: u8, sector_offset: u32, sector_count: u32 },
    /// Answered with an 8 byte [`crate::QueryInfoResponse`]
    QueryInfo { selector: QuerySelector, expected_crc: u32 },
    TransferOver { stage: TransferStage },
    Format { partition: u8 },
}

impl AdfuCommand {
    pub fn parse(cdb: &[u8; 16]) -> Result<Self, Error> {
        let sub_op: AdfuSubOpCode = FromPrimitive::from_u8(cdb[1]).ok_or(Error::InvalidFieldInCdb)?;
        Ok(match sub_op {
            AdfuSubOpCode::AccessRam => AdfuCommand::AccessRam {
                region: cdb[2],
                offset: BigEndian::read_u32(&cdb[3..7]),
                length: BigEndian::read_u32(&cdb[7..11]),
            },
            AdfuSubOpCode::DownloadImage => AdfuCommand::DownloadImage {
                partition: cdb[2],
                sector_offset: BigEndian::read_u32(&cdb[3..7]),
                sector_count: BigEndian::read_u32(&cdb[7..11]),
            },
            AdfuSubOpCode::QueryInfo => AdfuCommand::QueryInfo {
                selector: FromPrimitive::from_u8(cdb[2]).ok_or(Error::InvalidFieldInCdb)?,
                expected_crc: BigEndian::read_u32(&cdb[3..7]),
            },
            AdfuSubOpCode::TransferOver => AdfuCommand::TransferOver {
                stage: FromPrimitive::from_u8(cdb[2]).ok_or(Error::InvalidFieldInCdb)?,
            },
            AdfuSubOpCode::Format => AdfuCommand::Format { partition: cdb[2] },
        })
    }
}

#[test]
fn test_adfu_parse() {
    let mut cdb = [0u8; 16];
    cdb[..12].copy_from_slice(&[0xCC, 0x01, 3, 0, 0, 0x10, 0, 0, 0, 0x02, 0, 0]);
    assert_eq!(
        AdfuCommand::parse(&cdb).unwrap(),
        AdfuCommand::AccessRam { region: 3, offset: 0x1000, length: 0x200 }
    );

    cdb[..12].copy_from_slice(&[0xCC, 0x03, 2, 0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0, 0]);
    assert_eq!(
        AdfuCommand::parse(&cdb).unwrap(),
        AdfuCommand::QueryInfo { selector: QuerySelector::ImageChecksum, expected_crc: 0xDEADBEEF }
    );

    cdb[1] = 0x04;
    cdb[2] = 0x07;
    assert_eq!(AdfuCommand::parse(&cdb), Err(Error::InvalidFieldInCdb));

    cdb[1] = 0x7F;
    assert_eq!(AdfuCommand::parse(&cdb), Err(Error::InvalidFieldInCdb));
}
