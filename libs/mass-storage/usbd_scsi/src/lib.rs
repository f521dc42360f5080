//! SCSI transparent command set as carried over the Bulk Only Transport, plus
//! the ADFU vendor family (op codes 0xCC and 0xCD) used for in-field flashing.
//!
//! Everything here is framing: CDB parsing into [`Command`], sense data, and
//! the fixed format responses. Running the commands is up to the device side.

mod scsi;
pub use scsi::*;

mod block_device;
pub use block_device::*;

mod logging {
    pub use log::debug as trace_scsi_command;
}
