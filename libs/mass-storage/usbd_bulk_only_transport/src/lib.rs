//! USB mass storage Bulk Only Transport framing: wrappers and class requests.
//!
//! # Glossary
//!
//! - **CBW**: command block wrapper. Header that says what the next data
//!   stage carries and in which direction. Section 5.1 of [the BOT document][USBBot].
//! - **CSW**: command status wrapper. Sent after the data stage to report
//!   success or failure and how much was moved. Section 5.2.
//! - **Data residue**: bytes announced in the CBW minus bytes actually
//!   processed. Section 5.2.
//!
//! [USBBot]: https://www.usb.org/document-library/mass-storage-bulk-only-10
//!

mod bulk_only_transport;

pub use bulk_only_transport::*;

mod logging {
    pub use log::debug as trace_bot_headers;
    pub use log::debug as trace_usb_control;
}
