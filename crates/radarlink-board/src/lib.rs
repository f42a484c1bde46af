//! Board selection and handles over every compiled-in transport
//!
//! The CLI works only with this crate: it turns board strings such as
//! `udp:ip=169.254.1.101` into a [`BoardHandle`] and scans transport
//! families for boards, without knowing the transport crates.
//!
//! ```text
//!        CLI (radarlink)
//!              │
//!              ▼
//!      radarlink-board ── BoardHandle, open_board, enumerate
//!              │
//!   ┌──────────┼──────────┬──────────┐
//!   ▼          ▼          ▼          ▼
//!  udp        usb        spi        mock
//!   └──────────┴────┬─────┴──────────┘
//!                   ▼
//!            radarlink-core
//! ```
//!
//! # Example
//!
//! ```ignore
//! use radarlink_board::open_board;
//! use radarlink_core::board::BoardDatabase;
//!
//! let db = BoardDatabase::builtin();
//! let handle = open_board("usb", &db)?;
//! println!("{} firmware {}", handle.name(), handle.version()?);
//! ```

mod handle;
mod registry;

pub use handle::BoardHandle;
pub use registry::{
    available_transports, enumerate, enumerator, find_transport, open_board, open_descriptor,
    parse_board_params, transport_names_short, BoardParams, EnumerateOptions, TransportInfo,
};
