mod inquiry;
pub use inquiry::*;

mod request_sense;
pub use request_sense::*;

mod read_capacity;
pub use read_capacity::*;

mod read_format_capacities;
pub use read_format_capacities::*;

mod mode_sense;
pub use mode_sense::*;

mod query_info;
pub use query_info::*;
