use byteorder::{BigEndian, ByteOrder};
use num_traits::FromPrimitive;
use usbd_scsi::{cdb_length_for, AdfuSubOpCode, Command, OpCode, SenseData};

use crate::{
    adfu,
    logging::*,
    scsi,
    worker::{DataDirection, Worker},
    Error,
};

/// How a handler finished its data stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reply {
    /// `n` bytes of the reply sit in the current fill buffer
    Data(usize),
    /// The handler moved its data itself
    Handled,
}

pub(crate) type Handler = fn(&mut Worker, Command) -> Result<Reply, Error>;

/// Where the expected transfer length of a command comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SizeRule {
    None,
    Fixed(u32),
    Byte(usize),
    BeU16(usize),
    Blocks6,
    Blocks10,
    Blocks12,
    /// Byte count at CDB bytes 7..11
    AdfuBytes,
    /// Sector count at CDB bytes 7..11
    AdfuBlocks,
}

impl SizeRule {
    fn bytes(&self, cdb: &[u8; 16], block_bytes: u32) -> u32 {
        let blocks = |n: u32| n.saturating_mul(block_bytes);
        match *self {
            SizeRule::None => 0,
            SizeRule::Fixed(n) => n,
            SizeRule::Byte(i) => cdb[i] as u32,
            SizeRule::BeU16(i) => BigEndian::read_u16(&cdb[i..i + 2]) as u32,
            SizeRule::Blocks6 => blocks(if cdb[4] == 0 { 256 } else { cdb[4] as u32 }),
            SizeRule::Blocks10 => blocks(BigEndian::read_u16(&cdb[7..9]) as u32),
            SizeRule::Blocks12 => blocks(BigEndian::read_u32(&cdb[6..10])),
            SizeRule::AdfuBytes => BigEndian::read_u32(&cdb[7..11]),
            SizeRule::AdfuBlocks => blocks(BigEndian::read_u32(&cdb[7..11])),
        }
    }
}

/// One row of the command table
pub(crate) struct CommandEntry {
    pub name: &'static str,
    pub op_code: OpCode,
    /// Vendor commands are further keyed by CDB byte 1
    pub sub_op: Option<AdfuSubOpCode>,
    /// Shortest acceptable CDB; a longer one is fine
    pub cdb_len: usize,
    pub direction: DataDirection,
    pub size: SizeRule,
    /// Bit n set: CDB byte n may be non-zero. Byte 0 is the op code and
    /// never checked.
    pub mask: u32,
    pub needs_medium: bool,
    pub handler: Handler,
}

macro_rules! entry {
    (
        $name:expr, $op:ident, $sub:expr, $len:expr, $dir:ident, $size:expr, $mask:expr, $medium:expr,
        $handler:path
    ) => {
        CommandEntry {
            name: $name,
            op_code: OpCode::$op,
            sub_op: $sub,
            cdb_len: $len,
            direction: DataDirection::$dir,
            size: $size,
            mask: $mask,
            needs_medium: $medium,
            handler: $handler,
        }
    };
}

const RW6_MASK: u32 = (7 << 1) | (1 << 4);
const RW10_MASK: u32 = (1 << 1) | (0xf << 2) | (3 << 7);
const RW12_MASK: u32 = (1 << 1) | (0xf << 2) | (0xf << 6);
const ADFU_XFER_MASK: u32 = 0x3ff << 1;

#[rustfmt::skip]
static COMMANDS: &[CommandEntry] = &[
    entry!("TEST UNIT READY", TestUnitReady, None, 6, None, SizeRule::None, 0, true, scsi::do_test_unit_ready),
    entry!("REQUEST SENSE", RequestSense, None, 6, ToHost, SizeRule::Byte(4), 1 << 4, false, scsi::do_request_sense),
    entry!("INQUIRY", Inquiry, None, 6, ToHost, SizeRule::BeU16(3), (1 << 3) | (1 << 4), false, scsi::do_inquiry),
    entry!("MODE SELECT(6)", ModeSelect6, None, 6, FromHost, SizeRule::Byte(4), (1 << 1) | (1 << 4), false, scsi::do_mode_select),
    entry!("MODE SENSE(6)", ModeSense6, None, 6, ToHost, SizeRule::Byte(4), (1 << 1) | (1 << 2) | (1 << 4), false, scsi::do_mode_sense),
    entry!("START-STOP UNIT", StartStopUnit, None, 6, None, SizeRule::None, (1 << 1) | (1 << 4), false, scsi::do_start_stop),
    entry!("PREVENT-ALLOW MEDIUM REMOVAL", PreventAllowMediumRemoval, None, 6, None, SizeRule::None, 1 << 4, false, scsi::do_prevent_allow),
    entry!("READ(6)", Read6, None, 6, ToHost, SizeRule::Blocks6, RW6_MASK, true, scsi::do_read),
    entry!("WRITE(6)", Write6, None, 6, FromHost, SizeRule::Blocks6, RW6_MASK, true, scsi::do_write),
    entry!("READ FORMAT CAPACITIES", ReadFormatCapacities, None, 10, ToHost, SizeRule::BeU16(7), 3 << 7, true, scsi::do_read_format_capacities),
    entry!("READ CAPACITY", ReadCapacity10, None, 10, ToHost, SizeRule::Fixed(8), (0xf << 2) | (1 << 8), true, scsi::do_read_capacity),
    entry!("READ(10)", Read10, None, 10, ToHost, SizeRule::Blocks10, RW10_MASK, true, scsi::do_read),
    entry!("WRITE(10)", Write10, None, 10, FromHost, SizeRule::Blocks10, RW10_MASK, true, scsi::do_write),
    entry!("VERIFY", Verify10, None, 10, None, SizeRule::None, RW10_MASK, true, scsi::do_verify),
    entry!("SYNCHRONIZE CACHE", SynchronizeCache10, None, 10, None, SizeRule::None, (0xf << 2) | (3 << 7), true, scsi::do_synchronize_cache),
    entry!("MODE SELECT(10)", ModeSelect10, None, 10, FromHost, SizeRule::BeU16(7), (1 << 1) | (3 << 7), false, scsi::do_mode_select),
    entry!("MODE SENSE(10)", ModeSense10, None, 10, ToHost, SizeRule::BeU16(7), (1 << 1) | (1 << 2) | (3 << 7), false, scsi::do_mode_sense),
    entry!("READ(12)", Read12, None, 12, ToHost, SizeRule::Blocks12, RW12_MASK, true, scsi::do_read),
    entry!("WRITE(12)", Write12, None, 12, FromHost, SizeRule::Blocks12, RW12_MASK, true, scsi::do_write),
    entry!("ADFU ACCESS RAM", Adfu, Some(AdfuSubOpCode::AccessRam), 12, FromHost, SizeRule::AdfuBytes, ADFU_XFER_MASK, false, adfu::do_access_ram),
    entry!("ADFU DOWNLOAD IMAGE", Adfu, Some(AdfuSubOpCode::DownloadImage), 12, FromHost, SizeRule::AdfuBlocks, ADFU_XFER_MASK, true, adfu::do_download_image),
    entry!("ADFU QUERY INFO", Adfu, Some(AdfuSubOpCode::QueryInfo), 12, ToHost, SizeRule::Fixed(8), 0x3f << 1, true, adfu::do_query_info),
    entry!("ADFU TRANSFER OVER", Adfu, Some(AdfuSubOpCode::TransferOver), 12, None, SizeRule::None, 3 << 1, false, adfu::do_transfer_over),
    entry!("ADFU FORMAT", Adfu, Some(AdfuSubOpCode::Format), 12, None, SizeRule::None, 3 << 1, true, adfu::do_format),
    entry!("ADFU UPGRADE SUCCESS", UpgradeSuccess, None, 12, None, SizeRule::None, 0, false, adfu::do_upgrade_success),
];

pub(crate) fn lookup(cdb: &[u8; 16]) -> Option<&'static CommandEntry> {
    let op_code: OpCode = FromPrimitive::from_u8(cdb[0])?;
    let sub_op: Option<AdfuSubOpCode> = FromPrimitive::from_u8(cdb[1]);
    COMMANDS
        .iter()
        .find(|e| e.op_code == op_code && (e.sub_op.is_none() || e.sub_op == sub_op))
}

impl Worker {
    /// Run the command in `self.cmd.cbw` up to the end of its data stage
    pub(crate) fn do_scsi_command(&mut self) -> Result<(), Error> {
        // the host has our last CSW, so nothing of the previous command is
        // still in flight once the completions are in
        for index in 0..self.pool.len() {
            self.wait_while_busy(index)?;
        }
        self.pool.sync_drain_to_fill();
        self.cmd.phase_error = false;
        self.cmd.short_packet_received = false;

        let cdb = self.cmd.cbw.data;
        let block_bytes = self
            .luns
            .get(self.cmd.cbw.lun as usize)
            .map(|l| l.block_bytes() as u32)
            .unwrap_or(crate::lun::DEFAULT_BLOCK_BYTES as u32);

        let reply = match lookup(&cdb) {
            Some(entry) => {
                trace_scsi_command!(
                    "COMMAND> {} lun {} {} bytes {:?}",
                    entry.name,
                    self.cmd.cbw.lun,
                    self.cmd.data_size,
                    self.cmd.data_dir
                );
                self.cmd.data_size_from_cmnd = entry.size.bytes(&cdb, block_bytes);
                if self.check_command(entry.cdb_len, entry.direction, entry.mask, entry.needs_medium) {
                    match Command::extract_from_cbw(&self.cmd.cbw) {
                        Ok(command) => (entry.handler)(self, command)?,
                        Err(e) => {
                            self.set_sense(e.sense());
                            Reply::Data(0)
                        }
                    }
                } else {
                    Reply::Data(0)
                }
            }
            None => {
                trace_scsi_command!("COMMAND> unknown {:02X?}", self.cmd.cbw.cdb());
                self.cmd.data_size_from_cmnd = 0;
                let data_dir = self.cmd.data_dir;
                if self.check_command(cdb_length_for(cdb[0]), data_dir, !0, false) {
                    self.set_sense(SenseData::INVALID_COMMAND);
                }
                Reply::Data(0)
            }
        };

        if let Reply::Data(n) = reply {
            if self.cmd.data_dir == DataDirection::ToHost {
                let n = (n as u32).min(self.cmd.data_size_from_cmnd);
                let index = self.pool.fill_index();
                self.pool.release_as_full(index, n as usize);
                self.cmd.residue -= n;
            }
        }
        Ok(())
    }

    /// Sanity checks shared by every command. Returns false when the command
    /// must not run; the sense or phase error that explains why is already set.
    fn check_command(
        &mut self,
        cdb_len: usize,
        direction: DataDirection,
        mask: u32,
        needs_medium: bool,
    ) -> bool {
        let op_code = self.cmd.cbw.data[0];
        let direction = if self.cmd.data_size_from_cmnd == 0 { DataDirection::None } else { direction };

        // the host is entitled to ask for less than the command produces
        if self.cmd.data_size < self.cmd.data_size_from_cmnd {
            self.cmd.data_size_from_cmnd = self.cmd.data_size;
            self.cmd.phase_error = true;
        }
        self.cmd.residue = self.cmd.data_size;
        self.cmd.usb_amount_left = self.cmd.data_size;

        if self.cmd.data_dir != direction && self.cmd.data_size_from_cmnd > 0 {
            trace_scsi_command!("COMMAND> direction {:?} vs {:?}", self.cmd.data_dir, direction);
            self.cmd.phase_error = true;
            return false;
        }

        if (self.cmd.cbw.data_length as usize) < cdb_len {
            trace_scsi_command!("COMMAND> CDB is {} bytes, need {}", self.cmd.cbw.data_length, cdb_len);
            self.cmd.phase_error = true;
            return false;
        }

        let lun_index = self.cmd.cbw.lun as usize;
        let addresses_anything = op_code == OpCode::Inquiry as u8 || op_code == OpCode::RequestSense as u8;
        if lun_index < self.luns.len() {
            self.cmd.lun = Some(lun_index);
            if op_code != OpCode::RequestSense as u8 {
                self.luns[lun_index].sense = SenseData::NO_SENSE;
            }
        } else {
            self.cmd.lun = None;
            self.cmd.bad_lun_okay = false;
            if !addresses_anything {
                trace_scsi_command!("COMMAND> no LUN {}", lun_index);
                return false;
            }
        }

        if let Some(lun) = self.cur_lun() {
            if !lun.unit_attention.is_no_sense() && !addresses_anything {
                let ua = lun.unit_attention;
                lun.set_sense(ua);
                lun.unit_attention = SenseData::NO_SENSE;
                return false;
            }
        }

        // anything the command does not define must be zero
        for i in 1..cdb_len.min(self.cmd.cbw.data.len()) {
            if self.cmd.cbw.data[i] != 0 && mask & (1 << i) == 0 {
                self.set_sense(SenseData::INVALID_FIELD_IN_CDB);
                return false;
            }
        }

        if needs_medium {
            if let Some(lun) = self.cur_lun() {
                if !lun.has_medium() {
                    lun.set_sense(SenseData::MEDIUM_NOT_PRESENT);
                    return false;
                }
            }
        }
        true
    }
}
