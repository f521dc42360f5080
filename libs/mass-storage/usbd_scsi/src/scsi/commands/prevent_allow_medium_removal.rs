#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct PreventAllowMediumRemovalCommand {
    pub prevent: bool,
}

impl PreventAllowMediumRemovalCommand {
    pub fn parse(cdb: &[u8; 16]) -> Self {
        Self { prevent: cdb[4] & 0x01 != 0 }
    }
}
