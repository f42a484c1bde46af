//! CLI command implementations
//!
//! Commands work on a [`radarlink_board::BoardHandle`] and never see the
//! transport crates.

mod board;
mod list;
mod memory;
mod registers;
mod stream;

pub use board::{run_enumerate, run_info};
pub use list::{list_boards, list_components, list_transports};
pub use memory::run_read_memory;
pub use registers::{run_read_register, run_set_bits, run_write_register};
pub use stream::{run_stream, StreamArgs};
