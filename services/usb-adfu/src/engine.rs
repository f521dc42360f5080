use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded};
use usbd_bulk_only_transport::{ClassRequest, SetupPacket};

use crate::{
    logging::*,
    session::{EngineStats, Session, State},
    worker::Worker,
    CompletionSink, EngineConfig, Error, LogicalUnit, PartitionTable, PhaseChannel, PowerControl, RamStage,
    UsbEndpoints,
};

/// Everything the engine drives but does not own the implementation of
pub struct Collaborators {
    pub endpoints: Box<dyn UsbEndpoints>,
    /// LUN n is `luns[n]`
    pub luns: Vec<LogicalUnit>,
    pub ram: Box<dyn RamStage>,
    pub partitions: PartitionTable,
    pub phase: Box<dyn PhaseChannel>,
    pub power: Box<dyn PowerControl>,
}

/// What the caller should do with the control transfer it passed in
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlResponse {
    /// Send this data stage
    Data(Vec<u8>),
    /// The status stage completes later, through [`crate::UsbEndpoints::ack_control`]
    Delayed,
}

/// Handle to a bound function. Control events are raised from the caller's
/// context; the worker thread does the rest.
pub struct Engine {
    session: Arc<Session>,
    interface_number: u8,
    max_lun: u8,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Check the configuration, wire up the endpoints and start the worker
    pub fn bind(config: EngineConfig, mut parts: Collaborators) -> Result<Engine, Error> {
        config.validate(parts.luns.len())?;
        if parts.luns.iter().any(|lun| config.buffer_bytes % lun.block_bytes() != 0) {
            return Err(Error::InvalidConfig("buffer size must be a multiple of every block size"));
        }

        let (completion_tx, completion_rx) = unbounded();
        let (doorbell_tx, doorbell_rx) = bounded(1);
        parts.endpoints.attach(CompletionSink::new(completion_tx));

        let session = Arc::new(Session::new(doorbell_tx));
        let interface_number = config.interface_number;
        let max_lun = (parts.luns.len() - 1) as u8;
        log::info!(
            "binding {} LUN(s), {} x {} byte buffers",
            parts.luns.len(),
            config.buffer_count,
            config.buffer_bytes
        );
        let worker = Worker::new(config, session.clone(), parts, completion_rx, doorbell_rx);
        let handle = std::thread::Builder::new()
            .name("usb-adfu".to_string())
            .spawn(move || worker.run())?;

        Ok(Engine { session, interface_number, max_lun, worker: Some(handle) })
    }

    /// Handle a class specific control request. `Ok(None)` means the request
    /// isn't ours and should be passed on.
    pub fn class_request(&self, setup: &SetupPacket) -> Result<Option<ControlResponse>, Error> {
        match ClassRequest::parse(setup, self.interface_number)? {
            None => Ok(None),
            Some(ClassRequest::GetMaxLun) => {
                trace_usb_control!("USB_CONTROL> get max lun -> {}", self.max_lun);
                self.session.note_request();
                Ok(Some(ControlResponse::Data(vec![self.max_lun])))
            }
            Some(ClassRequest::BulkOnlyReset) => {
                trace_usb_control!("USB_CONTROL> bulk only reset");
                self.session.raise_for_request(State::Reset);
                Ok(Some(ControlResponse::Delayed))
            }
        }
    }

    /// SET_CONFIGURATION; 0 deconfigures
    pub fn set_configuration(&self, config: u8) {
        trace_usb_control!("USB_CONTROL> set configuration {}", config);
        self.session.raise_config_change(config);
    }

    /// SET_INTERFACE on our interface
    pub fn set_interface(&self) {
        self.session.raise_exception(State::InterfaceChange);
    }

    pub fn disconnect(&self) {
        self.session.raise_exception(State::Disconnect);
    }

    pub fn state(&self) -> State {
        self.session.state()
    }

    pub fn stats(&self) -> EngineStats {
        self.session.lock().stats
    }

    pub fn upgrade_latched(&self) -> bool {
        self.session.lock().upgrade_latch
    }

    /// Stop the worker, flush the units and release the buffers
    pub fn unbind(mut self) -> Result<(), Error> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        if let Some(handle) = self.worker.take() {
            self.session.raise_exception(State::Exit);
            handle.join().map_err(|_| Error::WorkerPanicked)?;
            trace_bot_states!("STATE> unbound");
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("unbind failed: {}", e);
        }
    }
}
