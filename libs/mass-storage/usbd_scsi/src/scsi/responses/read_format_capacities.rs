use byteorder::{BigEndian, ByteOrder};

/// Capacity list header plus one current/maximum capacity descriptor
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ReadFormatCapacitiesResponse {
    pub num_blocks: u32,
    pub block_size: u32,
}

const DESCRIPTOR_FORMATTED_MEDIA: u8 = 0x02;

impl ReadFormatCapacitiesResponse {
    pub const BYTES: usize = 12;

    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        // capacity list length, one 8 byte descriptor
        buf[3] = 8;
        BigEndian::write_u32(&mut buf[4..8], self.num_blocks);
        buf[8] = DESCRIPTOR_FORMATTED_MEDIA;
        BigEndian::write_u24(&mut buf[9..12], self.block_size);
        buf
    }
}

#[test]
fn test_read_format_capacities_pack() {
    let r = ReadFormatCapacitiesResponse { num_blocks: 1024, block_size: 512 };
    assert_eq!(r.pack(), [0, 0, 0, 8, 0, 0, 0x04, 0, 0x02, 0, 0x02, 0]);
}
