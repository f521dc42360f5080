use byteorder::{BigEndian, ByteOrder};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct InquiryCommand {
    /// If set, return vital data related to the page_code field
    pub enable_vital_product_data: bool,

    /// What kind of vital data to return
    pub page_code: u8,

    pub allocation_length: u16,
}

impl InquiryCommand {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self {
            enable_vital_product_data: cdb[1] & 0x01 != 0,
            page_code: cdb[2],
            allocation_length: BigEndian::read_u16(&cdb[3..5]),
        }
    }
}

/*
 if evpd
    return data related to page_code (spc-4 section 7.8)
    we don't carry any VPD pages, so this is always
        CHECK_CONDITION, ILLEGAL_REQUEST / INVALID_FIELD_IN_CDB

 if !evpd
    return standard inquiry data (spc-4 section 6.4.2)
*/

#[test]
fn test_inquiry() {
    let mut bytes = [0u8; 16];
    bytes[0] = 0x12;
    let mut cmd = InquiryCommand::default();
    assert_eq!(cmd, InquiryCommand::parse(&bytes));

    bytes[1] |= 0b00000001;
    cmd.enable_vital_product_data = true;
    assert_eq!(cmd, InquiryCommand::parse(&bytes));

    bytes[2] = 0x99;
    cmd.page_code = 0x99;
    assert_eq!(cmd, InquiryCommand::parse(&bytes));

    let al = 9999;
    bytes[3] = ((al >> 8) & 0xFF) as u8;
    bytes[4] = ((al >> 0) & 0xFF) as u8;
    cmd.allocation_length = al;
    assert_eq!(cmd, InquiryCommand::parse(&bytes));
}
