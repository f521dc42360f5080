use byteorder::{ByteOrder, LittleEndian};

use super::Direction;
use crate::{logging::*, Error};

/// Signature that identifies this packet as CBW ("USBC")
pub const CBW_SIGNATURE: u32 = 0x43425355;
const SIGNATURE_0: u8 = ((CBW_SIGNATURE >> 0) & 0xFF) as u8;
const SIGNATURE_1: u8 = ((CBW_SIGNATURE >> 8) & 0xFF) as u8;
const SIGNATURE_2: u8 = ((CBW_SIGNATURE >> 16) & 0xFF) as u8;
const SIGNATURE_3: u8 = ((CBW_SIGNATURE >> 24) & 0xFF) as u8;

/// The BOT spec allows LUNs 0..=15
pub const MAX_LUNS: u8 = 16;
/// Largest command block the wrapper can carry
pub const MAX_CDB_BYTES: usize = 16;

/// A wrapper that identifies a command sent from the host to the
/// device on the OUT endpoint. Describes the data transfer IN or OUT
/// that should happen immediatly after this wrapper is received.
/// Little Endian on the wire.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct CommandBlockWrapper {
    /// Tag sent by the host. Must be echoed back to host in tag
    /// field of the command status wrapper sent after the command
    /// has been executed/rejected. Host uses it to positively
    /// associate a CSW with the corresponding CBW
    pub tag: u32,
    /// Number of bytes of data that the host expects to receive on
    /// the IN or OUT endpoint (as indicated by the direction field)
    /// during the execution of this command. If this field is zero,
    /// must respond directly with CSW
    pub data_transfer_length: u32,
    /// Direction of transfer initiated by this command.
    /// 0b0XXXXXXX = OUT from host to device
    /// 0b1XXXXXXX = IN from device to host
    pub direction: Direction,
    /// The device Logical Unit Number (LUN) to which the command is
    /// for. For devices that don't support multiple LUNs the host will
    /// set this field to zero.
    pub lun: u8,
    /// The number of valid bytes in data field
    pub data_length: u8,
    /// The command set specific data for this command, zero padded
    pub data: [u8; MAX_CDB_BYTES],
}

impl Default for CommandBlockWrapper {
    fn default() -> Self {
        Self {
            tag: 0,
            data_transfer_length: 0,
            direction: Direction::HostToDevice,
            lun: 0,
            data_length: 0,
            data: [0; MAX_CDB_BYTES],
        }
    }
}

impl CommandBlockWrapper {
    pub const BYTES: usize = 31;

    fn check_signature(buf: &[u8]) -> bool {
        buf.len() >= 4
            && buf[0] == SIGNATURE_0
            && buf[1] == SIGNATURE_1
            && buf[2] == SIGNATURE_2
            && buf[3] == SIGNATURE_3
    }

    /// Parses exactly one wrapper. Anything but 31 bytes starting with the
    /// signature is `InvalidCbw`; a wrapper with reserved flag bits, a LUN the
    /// protocol can't address or a CDB length outside 1..=16 is `MeaninglessCbw`.
    pub fn parse(buf: &[u8]) -> Result<CommandBlockWrapper, Error> {
        if buf.len() != Self::BYTES || !Self::check_signature(buf) {
            trace_bot_headers!("HEADER> invalid CBW: len {} sig {:x?}", buf.len(), &buf[..buf.len().min(4)]);
            return Err(Error::InvalidCbw);
        }

        let direction = Direction::from_flags(buf[12])?;
        let lun = buf[13];
        let data_length = buf[14];
        if lun >= MAX_LUNS || data_length == 0 || data_length as usize > MAX_CDB_BYTES {
            trace_bot_headers!("HEADER> non-meaningful CBW: lun {} cdb len {}", lun, data_length);
            return Err(Error::MeaninglessCbw);
        }

        let mut data = [0u8; MAX_CDB_BYTES];
        data[..data_length as usize].copy_from_slice(&buf[15..15 + data_length as usize]);

        Ok(CommandBlockWrapper {
            tag: LittleEndian::read_u32(&buf[4..8]),
            data_transfer_length: LittleEndian::read_u32(&buf[8..12]),
            direction,
            lun,
            data_length,
            data,
        })
    }

    /// Serialises the wrapper the way a host would put it on the wire
    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        LittleEndian::write_u32(&mut buf[0..4], CBW_SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], self.tag);
        LittleEndian::write_u32(&mut buf[8..12], self.data_transfer_length);
        buf[12] = self.direction.flags();
        buf[13] = self.lun;
        buf[14] = self.data_length;
        buf[15..31].copy_from_slice(&self.data);
        buf
    }

    /// The valid part of the command block
    pub fn cdb(&self) -> &[u8] {
        &self.data[..self.data_length as usize]
    }
}
