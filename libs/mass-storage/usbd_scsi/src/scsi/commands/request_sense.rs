#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct RequestSenseCommand {
    /// Descriptor format requested; only fixed format is supported
    pub descriptor_format: bool,
    pub allocation_length: u8,
}

impl RequestSenseCommand {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self {
            descriptor_format: cdb[1] & 0x01 != 0,
            allocation_length: cdb[4],
        }
    }
}
