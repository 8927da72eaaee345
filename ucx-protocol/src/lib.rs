pub mod handlers;

pub use handlers::{move_cursor_params, Handlers, RESTART_COMMAND};
