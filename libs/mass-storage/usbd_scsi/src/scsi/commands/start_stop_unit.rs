#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StartStopUnitCommand {
    pub immediate: bool,
    pub power_condition: u8,
    pub load_eject: bool,
    pub start: bool,
}

impl StartStopUnitCommand {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self {
            immediate: cdb[1] & 0x01 != 0,
            power_condition: cdb[4] >> 4,
            load_eject: cdb[4] & 0x02 != 0,
            start: cdb[4] & 0x01 != 0,
        }
    }
}

#[test]
fn test_eject() {
    let mut data = [0u8; 16];
    data[..6].copy_from_slice(&[0x1B, 0, 0, 0, 0x02, 0]);
    let cmd = StartStopUnitCommand::parse(&data);
    assert!(cmd.load_eject);
    assert!(!cmd.start);
}
