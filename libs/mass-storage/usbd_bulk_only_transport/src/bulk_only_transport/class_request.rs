use crate::{logging::*, Error};

pub const REQ_GET_MAX_LUN: u8 = 0xFE;
pub const REQ_BULK_ONLY_RESET: u8 = 0xFF;

/// bmRequestType for class requests to an interface
const CLASS_INTERFACE_OUT: u8 = 0x21;
const CLASS_INTERFACE_IN: u8 = 0xA1;

/// The eight byte SETUP packet of a control transfer, already split into fields
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

/// The two class specific requests of the Bulk Only Transport
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ClassRequest {
    /// Bulk only mass storage reset, no data stage
    BulkOnlyReset,
    /// Get max LUN, one byte data stage
    GetMaxLun,
}

impl ClassRequest {
    /// Returns `Ok(None)` for requests that aren't ours so the caller can pass
    /// them on, and `Err(InvalidRequest)` for our requests with bad fields,
    /// which should be answered with a protocol stall.
    pub fn parse(setup: &SetupPacket, interface_number: u8) -> Result<Option<ClassRequest>, Error> {
        let (expected_type, expected_length, request) = match setup.request {
            REQ_BULK_ONLY_RESET => (CLASS_INTERFACE_OUT, 0, ClassRequest::BulkOnlyReset),
            REQ_GET_MAX_LUN => (CLASS_INTERFACE_IN, 1, ClassRequest::GetMaxLun),
            _ => return Ok(None),
        };
        if setup.request_type != expected_type {
            return Ok(None);
        }
        if setup.index != interface_number as u16 || setup.value != 0 || setup.length != expected_length {
            trace_usb_control!("USB_CONTROL> bad {:?}: {:?}", request, setup);
            return Err(Error::InvalidRequest);
        }
        trace_usb_control!("USB_CONTROL> {:?}", request);
        Ok(Some(request))
    }
}
