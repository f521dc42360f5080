/// Which of the fixed CDB layouts a command came in
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CommandLength {
    C6,
    C10,
    C12,
}

impl CommandLength {
    pub fn bytes(&self) -> usize {
        match self {
            CommandLength::C6 => 6,
            CommandLength::C10 => 10,
            CommandLength::C12 => 12,
        }
    }
}
