use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct ReadFormatCapacitiesCommand {
    pub allocation_length: u16,
}

impl ReadFormatCapacitiesCommand {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self { allocation_length: BigEndian::read_u16(&cdb[7..9]) }
    }
}
