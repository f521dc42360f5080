//! Data stage plumbing: streaming blocks to the host, streaming host data to
//! storage, and squaring the data stage with what the host announced.

use crc::{crc32, Hasher32};
use usbd_scsi::{BlockDeviceError, SenseData};

use crate::{
    buffer_pool::SlotState,
    dispatcher::Reply,
    logging::*,
    session::State,
    worker::{DataDirection, Worker},
    Error, TransferStatus,
};

/// Where the OUT data of a command ends up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlashTarget {
    /// Blocks of a logical unit, starting at `lba`
    Blocks { lun: usize, lba: u32 },
    /// A staging RAM region, starting at `offset`
    Ram { region: u8, offset: u32 },
}

/// A write the data stage is feeding
pub(crate) struct PendingFlashWrite {
    pub target: FlashTarget,
    /// Bytes the target can take before running out of room
    pub capacity: u64,
    /// Commits are whole multiples of this
    pub granule: usize,
    pub committed: u64,
    /// Running checksum of everything committed
    pub crc: Option<crc32::Digest>,
    pub failed: bool,
}

impl PendingFlashWrite {
    pub fn new(target: FlashTarget, capacity: u64, granule: usize) -> Self {
        PendingFlashWrite {
            target,
            capacity,
            granule: granule.max(1),
            committed: 0,
            crc: None,
            failed: false,
        }
    }

    pub fn with_crc(mut self, digest: crc32::Digest) -> Self {
        self.crc = Some(digest);
        self
    }

    /// The sense to report if the target runs out of room at `committed`
    fn out_of_range(&self) -> SenseData {
        match self.target {
            FlashTarget::Blocks { lba, .. } => SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE
                .with_information(lba.wrapping_add((self.committed / self.granule as u64) as u32)),
            FlashTarget::Ram { .. } => SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE,
        }
    }

    fn position(&self) -> u32 {
        match self.target {
            FlashTarget::Blocks { lba, .. } => {
                lba.wrapping_add((self.committed / self.granule as u64) as u32)
            }
            FlashTarget::Ram { offset, .. } => offset.wrapping_add(self.committed as u32),
        }
    }
}

impl Worker {
    /// Stream `data_size_from_cmnd` bytes from `lun` starting at `lba` to the
    /// host. The last buffer is left Full for `finish_reply`.
    pub(crate) fn read_to_host(&mut self, lun: usize, mut lba: u32) -> Result<Reply, Error> {
        let block_bytes = self.luns[lun].block_bytes();
        let num_blocks = self.luns[lun].num_blocks();
        let buffer_bytes = self.pool.buffer_bytes();
        let mut amount_left = self.cmd.data_size_from_cmnd as usize;
        if amount_left == 0 {
            return Ok(Reply::Data(0));
        }

        loop {
            let index = self.pool.fill_index();
            let room = num_blocks.saturating_sub(lba) as u64 * block_bytes as u64;
            let amount = (amount_left.min(buffer_bytes) as u64).min(room) as usize;

            self.wait_for_slot(index, SlotState::Empty)?;
            if amount == 0 {
                self.set_sense(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(lba));
                self.pool.release_as_full(index, 0);
                break;
            }

            // a truncated transfer still reads whole blocks
            let blocks = (amount + block_bytes - 1) / block_bytes;
            let result = {
                let buf = &mut self.pool.slot_mut(index).buf[..blocks * block_bytes];
                match self.luns[lun].store() {
                    Some(store) => store.read_blocks(lba, buf),
                    None => Err(BlockDeviceError::HardwareError),
                }
            };
            if let Err(e) = result {
                log::warn!("read of {} blocks at {} failed: {:?}", blocks, lba, e);
                self.set_sense(SenseData::UNRECOVERED_READ_ERROR.with_information(lba));
                self.pool.release_as_full(index, 0);
                break;
            }
            trace_pipeline!("BUFFER> read {} bytes at {}", amount, lba);
            lba += blocks as u32;
            amount_left -= amount;
            self.cmd.residue -= amount as u32;
            self.pool.release_as_full(index, amount);

            if amount_left == 0 {
                break;
            }
            self.start_in_transfer(index, amount, false);
            self.pool.advance_fill();
        }
        Ok(Reply::Handled)
    }

    /// Feed the OUT data stage into `pending`. Requests for more data overlap
    /// with committing what already arrived; only whole granules are committed
    /// and nothing already committed is rolled back.
    pub(crate) fn write_from_host(&mut self, pending: &mut PendingFlashWrite) -> Result<(), Error> {
        let buffer_bytes = self.pool.buffer_bytes();
        let mut get_some_more = true;
        let mut amount_left_to_req = self.cmd.data_size_from_cmnd as usize;
        let mut amount_left_to_write = self.cmd.data_size_from_cmnd as usize;
        let mut requested: u64 = 0;

        while amount_left_to_write > 0 {
            let fill = self.pool.fill_index();
            if get_some_more && self.pool.state(fill) == SlotState::Empty {
                if requested >= pending.capacity {
                    get_some_more = false;
                    let sense = pending.out_of_range();
                    self.set_sense(sense);
                    continue;
                }
                let amount = amount_left_to_req.min(buffer_bytes);
                requested += amount as u64;
                self.cmd.usb_amount_left -= amount as u32;
                amount_left_to_req -= amount;
                if amount_left_to_req == 0 {
                    get_some_more = false;
                }
                self.start_out_transfer(fill, amount);
                self.pool.advance_fill();
                continue;
            }

            let drain = self.pool.drain_index();
            if self.pool.state(drain) == SlotState::Empty && !get_some_more {
                // stopped early
                break;
            }
            self.wait_while_busy(drain)?;
            self.pool.advance_drain();
            self.pool.release_as_empty(drain);

            let (status, actual, intended) = {
                let slot = self.pool.slot(drain);
                (slot.status, slot.length, slot.intended)
            };
            if status != TransferStatus::Complete {
                self.set_sense(SenseData::COMMUNICATION_FAILURE.with_information(pending.position()));
                break;
            }

            // excess data from the host is dropped
            let mut amount = actual.min(intended);
            amount = (amount as u64).min(pending.capacity.saturating_sub(pending.committed)) as usize;
            amount -= amount % pending.granule;
            if amount > 0 {
                if let Err(e) = self.commit(pending, drain, amount) {
                    log::warn!("commit of {} bytes to {:?} failed: {:?}", amount, pending.target, e);
                    pending.failed = true;
                    let sense = match e {
                        BlockDeviceError::InvalidAddress => pending.out_of_range(),
                        _ => SenseData::WRITE_ERROR.with_information(pending.position()),
                    };
                    self.set_sense(sense);
                    break;
                }
                amount_left_to_write -= amount;
                self.cmd.residue -= amount as u32;
            }

            if actual < intended {
                trace_pipeline!("BUFFER> short packet, {} of {}", actual, intended);
                self.cmd.short_packet_received = true;
                break;
            }
        }
        Ok(())
    }

    fn commit(
        &mut self,
        pending: &mut PendingFlashWrite,
        index: usize,
        amount: usize,
    ) -> Result<(), BlockDeviceError> {
        let data = &self.pool.slot(index).buf[..amount];
        match pending.target {
            FlashTarget::Blocks { lun, lba } => {
                let lba = lba + (pending.committed / pending.granule as u64) as u32;
                let store = self.luns[lun].store().ok_or(BlockDeviceError::HardwareError)?;
                store.write_blocks(lba, data)?;
            }
            FlashTarget::Ram { region, offset } => {
                self.adfu.ram.write_blob(region, offset + pending.committed as u32, data)?;
            }
        }
        if let Some(digest) = pending.crc.as_mut() {
            digest.write(data);
        }
        trace_pipeline!("BUFFER> committed {} bytes to {:?}", amount, pending.target);
        pending.committed += amount as u64;
        Ok(())
    }

    /// Square the data stage with the length the host announced
    pub(crate) fn finish_reply(&mut self) -> Result<(), Error> {
        match self.cmd.data_dir {
            DataDirection::None => Ok(()),
            DataDirection::ToHost => {
                let index = self.pool.fill_index();
                if self.pool.state(index) != SlotState::Full {
                    self.pool.release_as_full(index, 0);
                }
                if self.cmd.residue == 0 {
                    self.send_fill_slot(false);
                    Ok(())
                } else if self.endpoints.supports_short_in() {
                    // the short packet (or a ZLP) ends the data stage
                    self.send_fill_slot(true);
                    Ok(())
                } else {
                    self.pad_with_zeros()
                }
            }
            DataDirection::FromHost => {
                if self.cmd.residue == 0 {
                    Ok(())
                } else if self.cmd.short_packet_received {
                    self.abort_bulk_out()
                } else {
                    self.throw_away_data()
                }
            }
        }
    }

    fn send_fill_slot(&mut self, zero: bool) {
        let index = self.pool.fill_index();
        let length = self.pool.slot(index).length;
        self.start_in_transfer(index, length, zero);
        self.pool.advance_fill();
    }

    /// The host stopped sending early: fail the command and let the exception
    /// path cancel whatever is still queued before the CSW goes out
    fn abort_bulk_out(&mut self) -> Result<(), Error> {
        if !self.sense_pending() {
            self.set_sense(SenseData::COMMUNICATION_FAILURE);
        }
        self.session.raise_exception(State::AbortBulkOut);
        Err(Error::Interrupted)
    }

    /// Send the rest of the announced IN length as zeros. The fill buffer may
    /// already hold the start of the reply.
    fn pad_with_zeros(&mut self) -> Result<(), Error> {
        let buffer_bytes = self.pool.buffer_bytes();
        let mut index = self.pool.fill_index();
        let mut keep = self.pool.slot(index).length;
        let mut amount_left = keep + self.cmd.residue as usize;
        trace_pipeline!("BUFFER> padding {} bytes", self.cmd.residue);

        let mut first = true;
        while amount_left > 0 {
            // the first buffer is ours already
            if !first {
                self.wait_for_slot(index, SlotState::Empty)?;
            }
            first = false;
            let send = amount_left.min(buffer_bytes);
            self.pool.slot_mut(index).buf[keep..send].fill(0);
            self.start_in_transfer(index, send, false);
            self.pool.advance_fill();
            index = self.pool.fill_index();
            amount_left -= send;
            keep = 0;
        }
        self.cmd.residue = 0;
        Ok(())
    }

    /// Drain OUT data the command had no use for
    pub(crate) fn throw_away_data(&mut self) -> Result<(), Error> {
        let buffer_bytes = self.pool.buffer_bytes();
        loop {
            let drain = self.pool.drain_index();
            if self.pool.state(drain) == SlotState::Empty && self.cmd.usb_amount_left == 0 {
                return Ok(());
            }

            if self.pool.state(drain) == SlotState::Full {
                let (short, length) = {
                    let slot = self.pool.slot(drain);
                    (slot.status != TransferStatus::Complete || slot.length < slot.intended, slot.length)
                };
                self.pool.release_as_empty(drain);
                self.pool.advance_drain();
                trace_pipeline!("BUFFER> discarded {} bytes", length);
                if short {
                    return self.abort_bulk_out();
                }
                continue;
            }

            let fill = self.pool.fill_index();
            if self.pool.state(fill) == SlotState::Empty && self.cmd.usb_amount_left > 0 {
                let amount = (self.cmd.usb_amount_left as usize).min(buffer_bytes);
                self.start_out_transfer(fill, amount);
                self.pool.advance_fill();
                self.cmd.usb_amount_left -= amount as u32;
                continue;
            }

            self.sleep_thread()?;
        }
    }
}
