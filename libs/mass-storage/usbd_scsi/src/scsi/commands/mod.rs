mod command;
pub use command::*;

mod command_length;
pub use command_length::*;

mod inquiry;
pub use inquiry::*;

mod request_sense;
pub use request_sense::*;

mod mode_select;
pub use mode_select::*;

mod mode_sense;
pub use mode_sense::*;

mod prevent_allow_medium_removal;
pub use prevent_allow_medium_removal::*;

mod read_format_capacities;
pub use read_format_capacities::*;

mod read;
pub use read::*;

mod write;
pub use write::*;

mod start_stop_unit;
pub use start_stop_unit::*;

mod synchronize_cache;
pub use synchronize_cache::*;

mod verify;
pub use verify::*;

mod adfu;
pub use adfu::*;
