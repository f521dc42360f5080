use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ReadCapacity10Response {
    pub max_lba: u32,
    pub block_size: u32,
}

impl ReadCapacity10Response {
    pub const BYTES: usize = 8;

    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        BigEndian::write_u32(&mut buf[0..4], self.max_lba);
        BigEndian::write_u32(&mut buf[4..8], self.block_size);
        buf
    }
}

#[test]
fn test_read_capacity_pack() {
    let r = ReadCapacity10Response { max_lba: 0x3FF, block_size: 512 };
    assert_eq!(r.pack(), [0, 0, 0x03, 0xFF, 0, 0, 0x02, 0]);
}
