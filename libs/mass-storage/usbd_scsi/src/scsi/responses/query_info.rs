use byteorder::{BigEndian, ByteOrder};

use crate::scsi::enums::QuerySelector;

/// Answer to an ADFU QUERY INFO command
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct QueryInfoResponse {
    pub passed: bool,
    pub selector: QuerySelector,
    /// CRC-32 of the checked image, or the number of inconsistent partitions
    pub value: u32,
}

impl QueryInfoResponse {
    pub const BYTES: usize = 8;

    pub fn pack(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        buf[0] = if self.passed { 0 } else { 1 };
        buf[1] = self.selector as u8;
        BigEndian::write_u32(&mut buf[4..8], self.value);
        buf
    }
}

#[test]
fn test_query_info_pack() {
    let r = QueryInfoResponse { passed: false, selector: QuerySelector::ImageChecksum, value: 0xCAFEF00D };
    assert_eq!(r.pack(), [1, 2, 0, 0, 0xCA, 0xFE, 0xF0, 0x0D]);
}
