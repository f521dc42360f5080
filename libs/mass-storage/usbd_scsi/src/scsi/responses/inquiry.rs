/// Standard INQUIRY data (SPC-3 6.4.2), 36 bytes
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct InquiryResponse<'a> {
    /// False when the host addressed a LUN we don't have; the peripheral
    /// qualifier then reports "not connected"
    pub lun_present: bool,
    pub removable: bool,
    /// Only the first 8 bytes are used, space padded
    pub vendor_identification: &'a str,
    /// Only the first 16 bytes are used, space padded
    pub product_identification: &'a str,
    /// Only the first 4 bytes are used, space padded
    pub product_revision_level: &'a str,
}

const PERIPHERAL_DIRECT_ACCESS: u8 = 0x00;
const PERIPHERAL_NOT_CONNECTED: u8 = 0x7F;
const VERSION_SPC2: u8 = 0x04;
const RESPONSE_DATA_FORMAT: u8 = 0x02;
const INQUIRY_BYTES: usize = 36;

impl<'a> InquiryResponse<'a> {
    pub const BYTES: usize = INQUIRY_BYTES;

    pub fn pack(&self) -> [u8; INQUIRY_BYTES] {
        let mut buf = [0u8; INQUIRY_BYTES];
        buf[0] = if self.lun_present { PERIPHERAL_DIRECT_ACCESS } else { PERIPHERAL_NOT_CONNECTED };
        buf[1] = if self.removable { 0x80 } else { 0 };
        buf[2] = VERSION_SPC2;
        buf[3] = RESPONSE_DATA_FORMAT;
        buf[4] = (INQUIRY_BYTES - 5) as u8;
        copy_padded(&mut buf[8..16], self.vendor_identification);
        copy_padded(&mut buf[16..32], self.product_identification);
        copy_padded(&mut buf[32..36], self.product_revision_level);
        buf
    }
}

fn copy_padded(dst: &mut [u8], s: &str) {
    for (i, d) in dst.iter_mut().enumerate() {
        *d = s.as_bytes().get(i).copied().unwrap_or(b' ');
    }
}

#[test]
fn test_inquiry_pack() {
    let r = InquiryResponse {
        lun_present: true,
        removable: true,
        vendor_identification: "Actions",
        product_identification: "Mass Storage Device",
        product_revision_level: "1.00",
    };
    let bytes = r.pack();
    assert_eq!(bytes.len(), InquiryResponse::BYTES);
    assert_eq!(bytes[0], 0);
    assert_eq!(bytes[1], 0x80);
    assert_eq!(bytes[4], 31);
    assert_eq!(&bytes[8..16], b"Actions ");
    assert_eq!(&bytes[16..32], b"Mass Storage Dev");
    assert_eq!(&bytes[32..36], b"1.00");

    let absent = InquiryResponse { lun_present: false, ..r }.pack();
    assert_eq!(absent[0], 0x7F);
}
