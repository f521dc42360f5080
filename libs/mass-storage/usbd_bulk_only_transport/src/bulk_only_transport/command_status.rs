/// The status of a command
#[derive(Clone, Copy, Eq, PartialEq, Debug, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum CommandStatus {
    /// Ok, command completed successfully
    CommandOk = 0x00,
    /// Error, command failed
    CommandError = 0x01,
    /// Host and device disagree about the data phase, reset required
    PhaseError = 0x02,
}

impl Default for CommandStatus {
    fn default() -> Self { CommandStatus::CommandOk }
}
