/// SCSI op codes as defined by SPC-3, plus the two vendor op codes used for
/// in-field flashing
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum OpCode {
    TestUnitReady = 0x00,
    RequestSense = 0x03,
    Read6 = 0x08,
    Write6 = 0x0A,
    Inquiry = 0x12,
    ModeSelect6 = 0x15,
    ModeSense6 = 0x1A,
    StartStopUnit = 0x1B,
    PreventAllowMediumRemoval = 0x1E,
    ReadFormatCapacities = 0x23,
    ReadCapacity10 = 0x25,
    Read10 = 0x28,
    Write10 = 0x2A,
    Verify10 = 0x2F,
    SynchronizeCache10 = 0x35,
    ModeSelect10 = 0x55,
    ModeSense10 = 0x5A,
    Read12 = 0xA8,
    Write12 = 0xAA,

    /// ADFU vendor family, sub-opcode in CDB byte 1
    Adfu = 0xCC,
    /// ADFU "upgrade successful", no data phase
    UpgradeSuccess = 0xCD,
}

impl OpCode {
    /// Length of the command block for this op code
    pub fn cdb_length(&self) -> usize {
        cdb_length_for(*self as u8)
    }
}

/// CDB length implied by the group code (top three bits) of any op code,
/// known to us or not
pub fn cdb_length_for(op_code: u8) -> usize {
    match op_code >> 5 {
        0 => 6,
        1 | 2 => 10,
        4 => 16,
        5 => 12,
        // reserved and vendor specific groups; our vendor commands use 12 bytes
        _ => 12,
    }
}

#[test]
fn test_cdb_length_groups() {
    assert_eq!(OpCode::Inquiry.cdb_length(), 6);
    assert_eq!(OpCode::Read10.cdb_length(), 10);
    assert_eq!(OpCode::ModeSense10.cdb_length(), 10);
    assert_eq!(OpCode::Write12.cdb_length(), 12);
    assert_eq!(OpCode::Adfu.cdb_length(), 12);
    assert_eq!(cdb_length_for(0x88), 16);
}
