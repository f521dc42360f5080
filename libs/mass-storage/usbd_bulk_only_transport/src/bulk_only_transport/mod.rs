mod direction;
pub use direction::*;

mod command_status;
pub use command_status::*;

mod command_block_wrapper;
pub use command_block_wrapper::*;

mod command_status_wrapper;
pub use command_status_wrapper::*;

mod class_request;
pub use class_request::*;

mod error;
pub use error::*;
