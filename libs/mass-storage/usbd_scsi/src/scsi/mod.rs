mod commands;
pub use commands::*;

mod enums;
pub use enums::*;

mod responses;
pub use responses::*;

mod error;
pub use error::*;
