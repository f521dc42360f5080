use num_traits::FromPrimitive;

/// MODE SENSE page control, bits 7:6 of CDB byte 2
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum PageControl {
    /// Current values
    CurrentValues = 0b00,
    /// Changeable values
    ChangeableValues = 0b01,
    /// Default values
    DefaultValues = 0b10,
    /// Saved values
    SavedValues = 0b11,
}

impl Default for PageControl {
    fn default() -> Self {
        PageControl::CurrentValues
    }
}

impl PageControl {
    pub fn from_cdb_byte(byte: u8) -> PageControl {
        // two bits can only ever decode to one of the four variants
        FromPrimitive::from_u8(byte >> 6).unwrap_or_default()
    }
}

/// Mode pages this device can report
pub const PAGE_CODE_CACHING: u8 = 0x08;
pub const PAGE_CODE_ALL: u8 = 0x3F;
