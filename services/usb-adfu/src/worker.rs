use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver};
use usbd_bulk_only_transport::{
    CommandBlockWrapper, CommandStatus, CommandStatusWrapper, Direction, Error as BulkOnlyTransportError,
};
use usbd_scsi::SenseData;

use crate::{
    adfu::AdfuState,
    buffer_pool::{BufferPool, SlotState},
    logging::*,
    session::{Session, State},
    AdfuPhase, Collaborators, Completion, EngineConfig, Endpoint, Error, LogicalUnit, PostUpgradeAction,
    PowerControl, TransferRequest, TransferStatus, UsbEndpoints,
};

/// Direction of the data stage, as the host announced it or as a command needs it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DataDirection {
    None,
    ToHost,
    FromHost,
}

impl Default for DataDirection {
    fn default() -> Self {
        DataDirection::None
    }
}

/// Bookkeeping for the command being processed
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CommandState {
    pub cbw: CommandBlockWrapper,
    pub data_dir: DataDirection,
    /// Bytes the host announced in the CBW
    pub data_size: u32,
    /// Bytes the command itself moves, never more than `data_size`
    pub data_size_from_cmnd: u32,
    /// Announced bytes not yet accounted for
    pub residue: u32,
    /// OUT bytes the host still has to send that no request asked for yet
    pub usb_amount_left: u32,
    pub phase_error: bool,
    pub short_packet_received: bool,
    /// INQUIRY and REQUEST SENSE may address a LUN that doesn't exist
    pub bad_lun_okay: bool,
    /// Index of the addressed unit, `None` if it doesn't exist
    pub lun: Option<usize>,
}

impl CommandState {
    fn for_cbw(cbw: CommandBlockWrapper) -> Self {
        let data_dir = match (cbw.data_transfer_length, cbw.direction) {
            (0, _) => DataDirection::None,
            (_, Direction::DeviceToHost) => DataDirection::ToHost,
            (_, Direction::HostToDevice) => DataDirection::FromHost,
        };
        CommandState {
            cbw,
            data_dir,
            data_size: cbw.data_transfer_length,
            residue: cbw.data_transfer_length,
            usb_amount_left: cbw.data_transfer_length,
            ..Default::default()
        }
    }
}

/// The thread that owns the buffers, the endpoints and the logical units
pub(crate) struct Worker {
    pub config: EngineConfig,
    pub session: Arc<Session>,
    pub endpoints: Box<dyn UsbEndpoints>,
    completions: Receiver<Completion>,
    doorbell: Receiver<()>,
    pub pool: BufferPool,
    pub luns: Vec<LogicalUnit>,
    pub adfu: AdfuState,
    power: Box<dyn PowerControl>,
    pub cmd: CommandState,
    /// A CBW failed validation; OUT data is ignored until a bulk only reset
    ignore_bulk_out: bool,
    endpoints_enabled: bool,
}

impl Worker {
    pub fn new(
        config: EngineConfig,
        session: Arc<Session>,
        parts: Collaborators,
        completions: Receiver<Completion>,
        doorbell: Receiver<()>,
    ) -> Self {
        let pool = BufferPool::new(config.buffer_count, config.buffer_bytes);
        Worker {
            config,
            session,
            endpoints: parts.endpoints,
            completions,
            doorbell,
            pool,
            luns: parts.luns,
            adfu: AdfuState::new(parts.ram, parts.partitions, parts.phase),
            power: parts.power,
            cmd: CommandState::default(),
            ignore_bulk_out: false,
            endpoints_enabled: false,
        }
    }

    pub fn run(mut self) {
        trace_bot_states!("STATE> worker up");
        self.adfu.tracker.restart();
        loop {
            let state = self.session.state();
            if state == State::Terminated {
                break;
            }
            if state.is_exception() {
                if let Err(e) = self.handle_exception() {
                    log::error!("exception handling failed: {}", e);
                    break;
                }
                continue;
            }
            let result = if self.session.running() {
                self.process_command()
            } else {
                self.sleep_thread()
            };
            match result {
                Ok(()) | Err(Error::Interrupted) => {}
                // already logged where the CBW was rejected
                Err(Error::Transport(_)) => {}
                Err(Error::ChannelClosed) => {
                    log::error!("completion channel closed, worker giving up");
                    break;
                }
                Err(e) => log::warn!("command abandoned: {}", e),
            }
        }
        self.session.lock().state = State::Terminated;
        trace_bot_states!("STATE> worker down");
    }

    fn process_command(&mut self) -> Result<(), Error> {
        self.get_next_command()?;
        self.session.set_phase(State::DataPhase);
        self.do_scsi_command()?;
        self.finish_reply()?;
        self.session.set_phase(State::StatusPhase);
        self.send_status()?;
        self.session.set_phase(State::Idle);
        let mut shared = self.session.lock();
        shared.stats.commands += 1;
        shared.stats.busy_high_water = self.pool.high_water();
        Ok(())
    }

    /// Block until a completion lands or an exception is raised
    pub fn sleep_thread(&mut self) -> Result<(), Error> {
        if self.session.exception_pending() {
            return Err(Error::Interrupted);
        }
        select! {
            recv(self.completions) -> msg => {
                let completion = msg.map_err(|_| Error::ChannelClosed)?;
                self.pool.complete(completion);
            }
            recv(self.doorbell) -> msg => {
                msg.map_err(|_| Error::ChannelClosed)?;
            }
        }
        if self.session.exception_pending() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Timed sleep that only an exception cuts short
    pub fn sleep_for(&mut self, timeout: Duration) -> Result<(), Error> {
        if self.session.exception_pending() {
            return Err(Error::Interrupted);
        }
        select! {
            recv(self.doorbell) -> msg => {
                msg.map_err(|_| Error::ChannelClosed)?;
            }
            default(timeout) => {}
        }
        if self.session.exception_pending() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    pub fn wait_for_slot(&mut self, index: usize, state: SlotState) -> Result<(), Error> {
        while self.pool.state(index) != state {
            self.sleep_thread()?;
        }
        Ok(())
    }

    /// Wait for slot `index` to leave Busy
    pub fn wait_while_busy(&mut self, index: usize) -> Result<(), Error> {
        while self.pool.state(index) == SlotState::Busy {
            self.sleep_thread()?;
        }
        Ok(())
    }

    /// Poll the phase channel until the installer reaches `expected`
    pub fn wait_for_phase(&mut self, expected: AdfuPhase) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.phase_timeout;
        loop {
            if self.adfu.tracker.poll(expected)? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::PhaseTimeout(expected));
            }
            self.sleep_for((deadline - now).min(self.config.phase_poll_interval))?;
        }
    }

    pub fn start_in_transfer(&mut self, index: usize, length: usize, zero: bool) {
        trace_pipeline!("BUFFER> IN slot {} {} bytes{}", index, length, if zero { " +zlp" } else { "" });
        let buf = self.pool.take_for_transfer(index, Endpoint::BulkIn);
        self.enqueue(Endpoint::BulkIn, TransferRequest { slot: index, buf, length, zero });
    }

    /// Ask for `intended` bytes; the wire request is rounded up to whole packets
    pub fn start_out_transfer(&mut self, index: usize, intended: usize) {
        let maxp = self.config.max_packet_size;
        let length = (intended + maxp - 1) / maxp * maxp;
        trace_pipeline!("BUFFER> OUT slot {} {} bytes", index, intended);
        self.pool.slot_mut(index).intended = intended;
        let buf = self.pool.take_for_transfer(index, Endpoint::BulkOut);
        self.enqueue(Endpoint::BulkOut, TransferRequest { slot: index, buf, length, zero: false });
    }

    fn enqueue(&mut self, ep: Endpoint, req: TransferRequest) {
        let slot = req.slot;
        if let Err(req) = self.endpoints.enqueue(ep, req) {
            log::warn!("{:?} refused transfer for slot {}", ep, slot);
            self.pool.complete(Completion {
                ep,
                slot,
                buf: req.buf,
                actual: 0,
                status: TransferStatus::Error,
            });
        }
    }

    pub fn cur_lun(&mut self) -> Option<&mut LogicalUnit> {
        match self.cmd.lun {
            Some(index) => self.luns.get_mut(index),
            None => None,
        }
    }

    /// Record `sense` against the addressed unit
    pub fn set_sense(&mut self, sense: SenseData) {
        if let Some(lun) = self.cur_lun() {
            lun.set_sense(sense);
        }
    }

    pub fn sense_pending(&self) -> bool {
        match self.cmd.lun {
            Some(index) => !self.luns[index].sense.is_no_sense(),
            None => false,
        }
    }

    fn get_next_command(&mut self) -> Result<(), Error> {
        let index = self.pool.fill_index();
        self.wait_for_slot(index, SlotState::Empty)?;
        self.start_out_transfer(index, CommandBlockWrapper::BYTES);
        // the CBW is consumed right here, the slot stays the next one to fill
        self.wait_for_slot(index, SlotState::Full)?;
        let result = self.received_cbw(index);
        self.pool.release_as_empty(index);
        result
    }

    fn received_cbw(&mut self, index: usize) -> Result<(), Error> {
        let parsed = {
            let slot = self.pool.slot(index);
            if slot.status != TransferStatus::Complete {
                trace_bot_headers!("HEADER> CBW transfer {:?}", slot.status);
                return Err(Error::Transport(BulkOnlyTransportError::InvalidCbw));
            }
            if self.ignore_bulk_out {
                trace_bot_headers!("HEADER> ignoring {} bytes until reset", slot.length);
                return Err(Error::Transport(BulkOnlyTransportError::InvalidCbw));
            }
            CommandBlockWrapper::parse(&slot.buf[..slot.length])
        };
        match parsed {
            Ok(cbw) => {
                trace_bot_headers!("HEADER> {:X?}", cbw);
                self.cmd = CommandState::for_cbw(cbw);
                Ok(())
            }
            Err(BulkOnlyTransportError::InvalidCbw) => {
                log::warn!("invalid CBW, stalling until reset recovery");
                // halt IN for good and drop OUT data until the host resets us
                self.endpoints.set_halt(Endpoint::BulkIn);
                self.ignore_bulk_out = true;
                Err(Error::Transport(BulkOnlyTransportError::InvalidCbw))
            }
            Err(e) => {
                log::warn!("meaningless CBW, stalling both pipes");
                self.endpoints.set_halt(Endpoint::BulkOut);
                self.endpoints.set_halt(Endpoint::BulkIn);
                Err(Error::Transport(e))
            }
        }
    }

    fn send_status(&mut self) -> Result<(), Error> {
        let index = self.pool.fill_index();
        self.wait_for_slot(index, SlotState::Empty)?;

        let sense = match self.cmd.lun {
            Some(lun) => self.luns[lun].sense,
            None if self.cmd.bad_lun_okay => SenseData::NO_SENSE,
            None => SenseData::LOGICAL_UNIT_NOT_SUPPORTED,
        };
        let status = if self.cmd.phase_error {
            CommandStatus::PhaseError
        } else if !sense.is_no_sense() {
            CommandStatus::CommandError
        } else {
            CommandStatus::CommandOk
        };
        let csw = CommandStatusWrapper::new(self.cmd.cbw.tag, self.cmd.residue, status);
        trace_bot_headers!("HEADER> {:X?}", csw);

        self.pool.slot_mut(index).buf[..CommandStatusWrapper::BYTES].copy_from_slice(&csw.pack());
        self.start_in_transfer(index, CommandStatusWrapper::BYTES, false);
        self.pool.advance_fill();
        Ok(())
    }

    fn set_interface(&mut self, enable: bool) {
        if self.endpoints_enabled {
            trace_bot_states!("STATE> endpoints down");
            self.endpoints.disable(Endpoint::BulkIn);
            self.endpoints.disable(Endpoint::BulkOut);
            self.endpoints_enabled = false;
        }
        if enable {
            trace_bot_states!("STATE> endpoints up, {} byte packets", self.config.max_packet_size);
            self.endpoints.enable(Endpoint::BulkIn, self.config.max_packet_size);
            self.endpoints.enable(Endpoint::BulkOut, self.config.max_packet_size);
            self.endpoints_enabled = true;
            self.ignore_bulk_out = false;
        }
        self.session.lock().running = enable;
    }

    fn flush_luns(&mut self) {
        for (i, lun) in self.luns.iter_mut().enumerate() {
            if let Err(e) = lun.flush() {
                log::warn!("flush of LUN {} failed: {:?}", i, e);
            }
        }
    }

    /// Cancel everything in flight, resynchronize the pool and act on the
    /// exception that was raised
    fn handle_exception(&mut self) -> Result<(), Error> {
        while self.doorbell.try_recv().is_ok() {}

        let busy: Vec<(usize, Endpoint)> = self.pool.busy().collect();
        for (index, ep) in busy {
            trace_exception!("EXCEPTION> cancel slot {} on {:?}", index, ep);
            self.endpoints.dequeue(ep, index);
        }
        while self.pool.busy_count() > 0 {
            let completion = self.completions.recv().map_err(|_| Error::ChannelClosed)?;
            self.pool.complete(completion);
        }
        self.pool.reset();

        let (old_state, exception_req_tag, new_config) = {
            let mut shared = self.session.lock();
            let old_state = shared.state;
            if old_state == State::AbortBulkOut {
                shared.state = State::StatusPhase;
            } else {
                shared.state = State::Idle;
            }
            shared.stats.exceptions_handled += 1;
            shared.stats.pool_clean_after_exception = self.pool.all_empty();
            shared.stats.busy_high_water = self.pool.high_water();
            (old_state, shared.exception_req_tag, shared.new_config)
        };
        trace_exception!("EXCEPTION> handling {:?}", old_state);

        if old_state != State::AbortBulkOut {
            for lun in self.luns.iter_mut() {
                lun.clear_transient();
            }
        }

        match old_state {
            State::AbortBulkOut => {
                // the command still gets its CSW
                match self.send_status() {
                    Ok(()) | Err(Error::Interrupted) => {}
                    Err(e) => return Err(e),
                }
                self.session.set_phase(State::Idle);
            }
            State::Reset => {
                if self.ignore_bulk_out {
                    self.ignore_bulk_out = false;
                    self.endpoints.clear_halt(Endpoint::BulkIn);
                }
                for lun in self.luns.iter_mut() {
                    lun.unit_attention = SenseData::RESET_OCCURRED;
                }
                // a newer control request makes this status stage moot
                if self.session.lock().ep0_req_tag == exception_req_tag {
                    self.endpoints.ack_control();
                }
            }
            State::InterfaceChange => {
                let configured = self.session.lock().config != 0;
                self.set_interface(configured);
            }
            State::ConfigChange => {
                self.session.lock().config = new_config;
                self.set_interface(new_config != 0);
            }
            State::Disconnect => {
                self.flush_luns();
                self.set_interface(false);
                let latched = {
                    let mut shared = self.session.lock();
                    shared.config = 0;
                    std::mem::replace(&mut shared.upgrade_latch, false)
                };
                if latched {
                    log::info!("upgrade finished, {:?}", self.config.post_upgrade_action);
                    match self.config.post_upgrade_action {
                        PostUpgradeAction::Halt => self.power.halt(),
                        PostUpgradeAction::Reboot => self.power.reboot(),
                        PostUpgradeAction::Nothing => {}
                    }
                    self.session.lock().stats.post_upgrade_actions += 1;
                }
            }
            State::Exit => {
                self.flush_luns();
                self.set_interface(false);
                self.pool.release_memory();
                self.session.lock().state = State::Terminated;
            }
            State::DataPhase | State::StatusPhase | State::Idle | State::Terminated => {}
        }
        Ok(())
    }
}
