//! # USB mass storage engine with ADFU flashing
//!
//! Device side of the Bulk Only Transport. A single worker thread pulls command
//! block wrappers off the bulk OUT endpoint, runs them against the logical units
//! (or the ADFU flash engine for the vendor op codes) through a small ring of
//! transfer buffers, and answers every command with a command status wrapper.
//!
//! USB control events (bulk only reset, configuration changes, disconnect) are
//! raised from the caller's context through [`Engine`] and preempt whatever the
//! worker is waiting on.
//!
//! The hardware, the storage and the userspace installer are collaborators:
//! see [`UsbEndpoints`], [`usbd_scsi::BlockDevice`], [`RamStage`],
//! [`PhaseChannel`] and [`PowerControl`].

mod error;
pub use error::*;

mod config;
pub use config::*;

mod endpoint;
pub use endpoint::*;

mod storage;
pub use storage::*;

mod phase;
pub use phase::*;

mod lun;
pub use lun::*;

mod buffer_pool;
mod session;
pub use session::{EngineStats, State};
mod dispatcher;
mod pipeline;
mod scsi;
mod adfu;
mod worker;

mod engine;
pub use engine::*;

mod logging {
    pub use log::debug as trace_bot_headers;
    pub use log::debug as trace_bot_states;
    pub use log::trace as trace_pipeline;
    pub use log::debug as trace_scsi_command;
    pub use log::debug as trace_exception;
    pub use log::debug as trace_usb_control;
    pub use log::debug as trace_sense;
    pub use log::debug as trace_adfu;
}
