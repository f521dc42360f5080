use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct SynchronizeCache10Command {
    pub immediate: bool,
    pub lba: u32,
    pub number_of_blocks: u16,
}

impl SynchronizeCache10Command {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self {
            immediate: cdb[1] & 0x02 != 0,
            lba: BigEndian::read_u32(&cdb[2..6]),
            number_of_blocks: BigEndian::read_u16(&cdb[7..9]),
        }
    }
}
