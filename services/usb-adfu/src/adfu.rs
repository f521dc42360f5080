//! ADFU vendor commands: staging blobs in RAM, streaming images into
//! partitions, checking them, and stepping the install phase the userspace
//! installer follows.

use crc::{crc32, Hasher32};
use usbd_scsi::{
    AdfuCommand, BlockDeviceError, Command, QueryInfoResponse, QuerySelector, SenseData, TransferStage,
};

use crate::{
    dispatcher::Reply,
    logging::*,
    phase::PhaseTracker,
    pipeline::{FlashTarget, PendingFlashWrite},
    worker::Worker,
    AdfuPhase, Error, PartitionTable, PhaseChannel, RamStage,
};

/// What has been downloaded into one partition, as one contiguous run
pub(crate) struct ImageRecord {
    pub partition: u8,
    pub start_lba: u32,
    pub blocks: u32,
    pub digest: crc32::Digest,
}

pub(crate) struct AdfuState {
    pub ram: Box<dyn RamStage>,
    pub partitions: PartitionTable,
    pub tracker: PhaseTracker,
    pub image: Option<ImageRecord>,
}

impl AdfuState {
    pub fn new(ram: Box<dyn RamStage>, partitions: PartitionTable, phase: Box<dyn PhaseChannel>) -> Self {
        AdfuState { ram, partitions, tracker: PhaseTracker::new(phase), image: None }
    }
}

impl Worker {
    /// Index of the addressed unit if it takes ADFU commands
    fn adfu_lun(&self) -> Option<usize> {
        self.cmd.lun.filter(|&lun| lun == self.config.adfu_lun as usize)
    }

    /// Fail a vendor command and tell the installer
    fn adfu_fail(&mut self, sense: SenseData) -> Reply {
        self.adfu.tracker.advance(AdfuPhase::Failed);
        self.fail(sense)
    }

    /// Outcome of waiting for the installer to reach a phase
    fn adfu_wait(&mut self, expected: AdfuPhase, failure: SenseData) -> Result<Reply, Error> {
        match self.wait_for_phase(expected) {
            Ok(()) => Ok(Reply::Data(0)),
            Err(Error::PhaseTimeout(phase)) => {
                log::warn!("installer never reached {}", phase.name());
                Ok(self.adfu_fail(SenseData::COMMUNICATION_TIMEOUT))
            }
            Err(Error::PhaseFailed) => {
                log::warn!("installer failed waiting for {}", expected.name());
                Ok(self.fail(failure))
            }
            Err(Error::Io(e)) => {
                log::warn!("phase channel unreadable: {}", e);
                Ok(self.adfu_fail(SenseData::COMMUNICATION_FAILURE))
            }
            Err(e) => Err(e),
        }
    }

    /// A write that failed, or that the host cut short, leaves the install failed
    fn adfu_settle(&mut self, pending: &PendingFlashWrite) {
        if pending.failed || self.sense_pending() || self.cmd.short_packet_received {
            self.adfu.tracker.advance(AdfuPhase::Failed);
        }
    }

    fn image_checksum(&mut self, lun: usize) -> Result<Option<u32>, BlockDeviceError> {
        let Some(record) = self.adfu.image.as_ref() else { return Ok(None) };
        let (mut lba, mut left) = (record.start_lba, record.blocks);
        let block_bytes = self.luns[lun].block_bytes();
        let per_buffer = (self.pool.buffer_bytes() / block_bytes) as u32;
        let fill = self.pool.fill_index();
        let mut digest = crc32::Digest::new(crc32::IEEE);
        while left > 0 {
            let blocks = left.min(per_buffer);
            let buf = &mut self.pool.slot_mut(fill).buf[..blocks as usize * block_bytes];
            let store = self.luns[lun].store().ok_or(BlockDeviceError::HardwareError)?;
            store.read_blocks(lba, buf)?;
            digest.write(buf);
            lba += blocks;
            left -= blocks;
        }
        Ok(Some(digest.sum32()))
    }
}

pub(crate) fn do_access_ram(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Adfu(AdfuCommand::AccessRam { region, offset, length }) = command else {
        return Ok(w.mismatch(&command));
    };
    if w.adfu_lun().is_none() {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    trace_adfu!("ADFU> stage {} bytes at {:#x} of region {}", length, offset, region);
    w.adfu.tracker.advance(AdfuPhase::Flashing);

    let mut pending = PendingFlashWrite::new(FlashTarget::Ram { region, offset }, u64::MAX, 1);
    w.write_from_host(&mut pending)?;
    w.adfu_settle(&pending);
    Ok(Reply::Handled)
}

pub(crate) fn do_download_image(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Adfu(AdfuCommand::DownloadImage { partition, sector_offset, sector_count }) = command else {
        return Ok(w.mismatch(&command));
    };
    let Some(lun) = w.adfu_lun() else { return Ok(w.fail(SenseData::INVALID_COMMAND)) };
    let Some(part) = w.adfu.partitions.get(partition).copied() else {
        log::warn!("download to unknown partition {}", partition);
        return Ok(w.adfu_fail(SenseData::INVALID_FIELD_IN_CDB));
    };
    let num_blocks = w.luns[lun].num_blocks();
    if sector_offset as u64 + sector_count as u64 > part.blocks as u64 || part.end_lba() > num_blocks as u64 {
        return Ok(w.adfu_fail(SenseData::LOGICAL_BLOCK_ADDRESS_OUT_OF_RANGE.with_information(sector_offset)));
    }
    if w.luns[lun].config.read_only {
        return Ok(w.adfu_fail(SenseData::WRITE_PROTECTED));
    }
    trace_adfu!("ADFU> {} sectors at {} of partition {}", sector_count, sector_offset, partition);
    w.adfu.tracker.advance(AdfuPhase::WritingPhy);

    let start = part.start_lba + sector_offset;
    // a download that picks up where the last one stopped extends its record
    let (record_start, record_blocks, digest) = match w.adfu.image.take() {
        Some(r) if r.partition == partition && r.start_lba as u64 + r.blocks as u64 == start as u64 => {
            (r.start_lba, r.blocks, r.digest)
        }
        _ => (start, 0, crc32::Digest::new(crc32::IEEE)),
    };

    let block_bytes = w.luns[lun].block_bytes();
    let capacity = (part.blocks - sector_offset) as u64 * block_bytes as u64;
    let target = FlashTarget::Blocks { lun, lba: start };
    let mut pending = PendingFlashWrite::new(target, capacity, block_bytes).with_crc(digest);
    let result = w.write_from_host(&mut pending);

    let written = (pending.committed / block_bytes as u64) as u32;
    if let Some(digest) = pending.crc.take() {
        w.adfu.image =
            Some(ImageRecord { partition, start_lba: record_start, blocks: record_blocks + written, digest });
    }
    result?;
    w.adfu_settle(&pending);
    Ok(Reply::Handled)
}

pub(crate) fn do_query_info(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Adfu(AdfuCommand::QueryInfo { selector, expected_crc }) = command else {
        return Ok(w.mismatch(&command));
    };
    let Some(lun) = w.adfu_lun() else { return Ok(w.fail(SenseData::INVALID_COMMAND)) };

    let (passed, value) = match selector {
        QuerySelector::PartitionConsistency => {
            let bad = w.adfu.partitions.inconsistencies(w.luns[lun].num_blocks());
            (bad == 0, bad)
        }
        QuerySelector::ImageChecksum => match w.image_checksum(lun) {
            Ok(Some(crc)) => {
                trace_adfu!("ADFU> image crc {:08x}, host expects {:08x}", crc, expected_crc);
                (crc == expected_crc, crc)
            }
            Ok(None) => {
                log::warn!("checksum query without a downloaded image");
                (false, 0)
            }
            Err(e) => {
                log::warn!("image read back failed: {:?}", e);
                return Ok(w.adfu_fail(SenseData::UNRECOVERED_READ_ERROR));
            }
        },
    };

    let response = QueryInfoResponse { passed, selector, value }.pack();
    w.fill_buf()[..QueryInfoResponse::BYTES].copy_from_slice(&response);
    if !passed {
        // the host still gets the response, the CSW carries the failure
        w.adfu_fail(SenseData::MISCOMPARE);
    }
    Ok(Reply::Data(QueryInfoResponse::BYTES))
}

pub(crate) fn do_transfer_over(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Adfu(AdfuCommand::TransferOver { stage }) = command else {
        return Ok(w.mismatch(&command));
    };
    if w.adfu_lun().is_none() {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    trace_adfu!("ADFU> transfer over, {:?}", stage);
    match stage {
        TransferStage::RamStaged => {
            w.adfu.tracker.advance(AdfuPhase::FlashDone);
            Ok(Reply::Data(0))
        }
        TransferStage::PartitionsWritten => {
            w.adfu.tracker.advance(AdfuPhase::WriteDone);
            Ok(Reply::Data(0))
        }
        TransferStage::Finished => {
            w.adfu.tracker.advance(AdfuPhase::Finished);
            w.adfu_wait(AdfuPhase::FinishedOk, SenseData::COMMUNICATION_FAILURE)
        }
    }
}

pub(crate) fn do_format(w: &mut Worker, command: Command) -> Result<Reply, Error> {
    let Command::Adfu(AdfuCommand::Format { partition }) = command else {
        return Ok(w.mismatch(&command));
    };
    if w.adfu_lun().is_none() {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    if w.adfu.partitions.get(partition).is_none() {
        return Ok(w.adfu_fail(SenseData::INVALID_FIELD_IN_CDB));
    }
    trace_adfu!("ADFU> format partition {}", partition);
    w.adfu.tracker.advance(AdfuPhase::Formatting);
    w.adfu_wait(AdfuPhase::FormatDone, SenseData::FORMAT_FAILED)
}

/// Latch the upgrade as done; the post-upgrade action runs at disconnect
pub(crate) fn do_upgrade_success(w: &mut Worker, _command: Command) -> Result<Reply, Error> {
    if w.adfu_lun().is_none() {
        return Ok(w.fail(SenseData::INVALID_COMMAND));
    }
    log::info!("upgrade reported successful");
    w.session.lock().upgrade_latch = true;
    Ok(Reply::Data(0))
}
