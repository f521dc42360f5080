//! Handlers for the standard SCSI command subset

use byteorder::{BigEndian, ByteOrder};
use usbd_scsi::{
    mode_sense_response, BlockDeviceError, Command, InquiryResponse, ReadCapacity10Response,
    ReadFormatCapacitiesResponse, SenseData,
};

use crate::{
    dispatcher::Reply,
    pipeline::{FlashTarget, PendingFlashWrite},
    worker::Worker,
    Error,
};

impl Worker {
    /// Fail the command with `sense`
    pub(crate) fn fail(&mut self, sense: SenseData) -> Reply {
        self.set_sense(sense);
        Reply::Data(0)
    }

    /// The table routed a command to a handler that doesn't take it
    pub(crate) fn mismatch(&mut self, command: &Command) -> Reply {
        log::error!("no handler for {:?}", command);
        self.fail(SenseData::INVALID_COMMAND)
    }

    pub(crate) fn fill_buf(&mut self) -> &mut [u8] {
        let index = self.pool.fill_index();
        &mut self.pool.slot_mut(index).buf[..]
    }
}

pub(crate) fn do_test_unit_ready(_w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    Ok(Reply::Data(0))
}

pub(crate) fn do_inquiry(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    let removable = match w.cmd.lun {
        Some(lun) => w.luns[lun].config.removable,
        None => {
            w.cmd.bad_lun_okay = true;
            false
        }
    };
    let response = InquiryResponse {
        lun_present: w.cmd.lun.is_some(),
        removable,
        vendor_identification: &w.config.vendor_identification,
        product_identification: &w.config.product_identification,
        product_revision_level: &w.config.product_revision_level,
    }
    .pack();
    w.fill_buf()[..InquiryResponse::BYTES].copy_from_slice(&response);
    Ok(Reply::Data(InquiryResponse::BYTES))
}

pub(crate) fn do_request_sense(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    let sense = match w.cmd.lun {
        Some(lun) => {
            let sense = w.luns[lun].sense;
            w.luns[lun].set_sense(SenseData::NO_SENSE);
            sense
        }
        None => {
            w.cmd.bad_lun_okay = true;
            SenseData::LOGICAL_UNIT_NOT_SUPPORTED
        }
    };
    w.fill_buf()[..SenseData::BYTES].copy_from_slice(&sense.pack());
    Ok(Reply::Data(SenseData::BYTES))
}

pub(crate) fn do_read_capacity(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    let Some(lun) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    let cdb = w.cmd.cbw.data;
    let lba = BigEndian::read_u32(&cdb[2..6]);
    let pmi = cdb[8];
    // partial medium indicator with a nonzero LBA is all we can't answer
    if pmi > 1 || (pmi == 0 && lba != 0) {
        return Ok(w.fail(SenseData::INVALID_FIELD_IN_CDB));
    }
    let response = ReadCapacity10Response {
        max_lba: w.luns[lun].num_blocks().saturating_sub(1),
        block_size: w.luns[lun].block_bytes() as u32,
    }
    .pack();
    w.fill_buf()[..ReadCapacity10Response::BYTES].copy_from_slice(&response);
    Ok(Reply::Data(ReadCapacity10Response::BYTES))
}

pub(crate) fn do_read_format_capacities(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    let Some(lun) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    let response = ReadFormatCapacitiesResponse {
        num_blocks: w.luns[lun].num_blocks(),
        block_size: w.luns[lun].block_bytes() as u32,
    }
    .pack();
    w.fill_buf()[..ReadFormatCapacitiesResponse::BYTES].copy_from_slice(&response);
    Ok(Reply::Data(ReadFormatCapacitiesResponse::BYTES))
}

pub(crate) fn do_mode_sense(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::ModeSense(cmd) = command else { return Ok(w.mismatch(&command)) };
    let write_protected = w.cmd.lun.map(|lun| w.luns[lun].config.read_only).unwrap_or(false);
    match mode_sense_response(&cmd, write_protected) {
        Ok(bytes) => {
            let buf = w.fill_buf();
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            Ok(Reply::Data(n))
        }
        Err(e) => Ok(w.fail(e.sense())),
    }
}

/// No mode page is changeable
pub(crate) fn do_mode_select(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    Ok(w.fail(SenseData::INVALID_COMMAND))
}

pub(crate) fn do_prevent_allow(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::PreventAllowMediumRemoval(cmd) = command else { return Ok(w.mismatch(&command)) };
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    if !w.luns[index].config.removable {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    if w.cmd.cbw.data[4] & !0x01 != 0 {
        return Ok(w.fail(SenseData::INVALID_FIELD_IN_CDB));
    }
    let lun = &mut w.luns[index];
    if lun.prevent_medium_removal && !cmd.prevent {
        if let Err(e) = lun.flush() {
            log::warn!("flush before allowing removal failed: {:?}", e);
        }
    }
    lun.prevent_medium_removal = cmd.prevent;
    Ok(Reply::Data(0))
}

pub(crate) fn do_start_stop(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::StartStopUnit(cmd) = command else { return Ok(w.mismatch(&command)) };
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    if !w.luns[index].config.removable {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    let cdb = w.cmd.cbw.data;
    if cdb[1] & !0x01 != 0 || cdb[4] & !0x03 != 0 || cmd.power_condition != 0 {
        return Ok(w.fail(SenseData::INVALID_FIELD_IN_CDB));
    }
    if !cmd.load_eject {
        return Ok(Reply::Data(0));
    }

    let lun = &mut w.luns[index];
    if cmd.start {
        // nothing to load, the medium is either there or it isn't
        if !lun.has_medium() {
            return Ok(w.fail(SenseData::MEDIUM_NOT_PRESENT));
        }
        return Ok(Reply::Data(0));
    }
    if lun.prevent_medium_removal {
        return Ok(w.fail(SenseData::MEDIUM_REMOVAL_PREVENTED));
    }
    log::info!("LUN {} ejected", index);
    match lun.eject() {
        Ok(()) => Ok(Reply::Data(0)),
        Err(_) => Ok(w.fail(SenseData::WRITE_ERROR)),
    }
}

pub(crate) fn do_synchronize_cache(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    match w.luns[index].flush() {
        Ok(()) => Ok(Reply::Data(0)),
        Err(e) => {
            log::warn!("cache flush failed: {:?}", e);
            Ok(w.fail(SenseData::WRITE_ERROR))
        }
    }
}

/// Read the range back and throw it away; the medium answering is the check
pub(crate) fn do_verify(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Verify(cmd) = command else { return Ok(w.mismatch(&command)) };
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    if cmd.byte_check {
        return Ok(w.fail(SenseData::INVALID_FIELD_IN_CDB));
    }
    let num_blocks = w.luns[index].num_blocks();
    if cmd.lba >= num_blocks {
        return Ok(w.fail(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(cmd.lba)));
    }

    let block_bytes = w.luns[index].block_bytes();
    let per_buffer = (w.pool.buffer_bytes() / block_bytes) as u32;
    let mut lba = cmd.lba;
    let mut left = cmd.verification_length as u32;
    while left > 0 {
        if lba >= num_blocks {
            return Ok(w.fail(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(lba)));
        }
        let blocks = left.min(per_buffer).min(num_blocks - lba);
        let fill = w.pool.fill_index();
        let result = {
            let buf = &mut w.pool.slot_mut(fill).buf[..blocks as usize * block_bytes];
            match w.luns[index].store() {
                Some(store) => store.read_blocks(lba, buf),
                None => Err(BlockDeviceError::HardwareError),
            }
        };
        if result.is_err() {
            return Ok(w.fail(SenseData::UNRECOVERED_READ_ERROR.with_information(lba)));
        }
        lba += blocks;
        left -= blocks;
    }
    Ok(Reply::Data(0))
}

pub(crate) fn do_read(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Read(cmd) = command else { return Ok(w.mismatch(&command)) };
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    if cmd.lba >= w.luns[index].num_blocks() {
        return Ok(w.fail(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(cmd.lba)));
    }
    w.read_to_host(index, cmd.lba)
}

pub(crate) fn do_write(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Write(cmd) = command else { return Ok(w.mismatch(&command)) };
    let Some(index) = w.cmd.lun else { return Ok(Reply::Data(0)) };
    let lun = &w.luns[index];
    if lun.config.read_only {
        return Ok(w.fail(SenseData::WRITE_PROTECTED));
    }
    let num_blocks = lun.num_blocks();
    let block_bytes = lun.block_bytes();
    if cmd.lba >= num_blocks {
        return Ok(w.fail(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(cmd.lba)));
    }

    let capacity = (num_blocks - cmd.lba) as u64 * block_bytes as u64;
    let target = FlashTarget::Blocks { lun: index, lba: cmd.lba };
    let mut pending = PendingFlashWrite::new(target, capacity, block_bytes);
    w.write_from_host(&mut pending)?;

    if cmd.fua && !pending.failed {
        if let Err(e) = w.luns[index].flush() {
            log::warn!("forced unit access flush failed: {:?}", e);
            w.set_sense(SenseData::WRITE_ERROR);
        }
    }
    Ok(Reply::Handled)
}
