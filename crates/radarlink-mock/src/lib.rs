//! radarlink-mock - Emulated radar board for testing
//!
//! [`MockBoard`] models board firmware: it reassembles chunked vendor
//! commands, runs them against in-memory register files, pins and flash,
//! and answers with the same response transfers real hardware sends.
//! Failures can be injected per (address, function id) and every request
//! is recorded for inspection.
//!
//! The board can be reached through an in-memory [`MockLink`], through a
//! complete bridge from [`mock_bridge`], or over a localhost UDP socket
//! with [`MockUdpBoard`].

mod data;
mod device;
mod link;
mod udp;

#[cfg(test)]
mod scenarios;

pub use data::{check_frame, fill_frame, MockDataChannel, MockFrameSource};
pub use device::{ExecutedCommand, MockBoard, MockConfig, PinState};
pub use link::{MockLink, DEFAULT_TIMEOUT};
pub use udp::MockUdpBoard;

use parking_lot::Mutex;
use radarlink_core::board::{
    BoardDescriptor, BoardFilter, Boards, Connector, Enumerator, TransportFamily, TransportId,
};
use radarlink_core::bridge::{Bridge, ControlChannel, LinkBridge};
use radarlink_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Board shared between the test and the links talking to it
pub type SharedBoard = Arc<Mutex<MockBoard>>;

/// Wrap a board for sharing
pub fn shared(board: MockBoard) -> SharedBoard {
    Arc::new(Mutex::new(board))
}

/// Bridge with control and data channels to `board`
pub fn mock_bridge(board: &SharedBoard) -> LinkBridge {
    mock_bridge_with_timeout(board, DEFAULT_TIMEOUT)
}

/// Like [`mock_bridge`] with a custom control receive timeout
pub fn mock_bridge_with_timeout(board: &SharedBoard, timeout: Duration) -> LinkBridge {
    let link = MockLink::new(board.clone()).with_timeout(timeout);
    LinkBridge::with_data(
        ControlChannel::new(Box::new(link)),
        Arc::new(MockDataChannel::new(board.clone())),
    )
}

/// Connects descriptors to one emulated board
pub struct MockConnector {
    board: SharedBoard,
}

impl Connector for MockConnector {
    fn connect(&self, _descriptor: &BoardDescriptor) -> Result<Arc<dyn Bridge>> {
        Ok(Arc::new(mock_bridge(&self.board)))
    }
}

/// Enumerator over a fixed set of emulated boards
#[derive(Default)]
pub struct MockEnumerator {
    boards: Vec<SharedBoard>,
}

impl MockEnumerator {
    /// Enumerator reporting `boards` in order
    pub fn new(boards: Vec<SharedBoard>) -> Self {
        Self { boards }
    }

    /// Enumerator with one default board
    pub fn new_default() -> Self {
        Self::new(vec![shared(MockBoard::new_default())])
    }
}

impl Enumerator for MockEnumerator {
    fn family(&self) -> TransportFamily {
        TransportFamily::Mock
    }

    fn enumerate(&self, filter: &BoardFilter) -> Result<Boards<'_>> {
        let filter = filter.clone();
        Ok(Box::new(self.boards.iter().enumerate().filter_map(
            move |(index, board)| {
                let info = board.lock().config().info.clone();
                if !filter.matches(&info.name, info.vid, info.pid) {
                    return None;
                }
                let connector = Arc::new(MockConnector {
                    board: board.clone(),
                });
                Some(BoardDescriptor::new(
                    info.name,
                    info.vid,
                    info.pid,
                    TransportId::Mock(format!("mock{}", index)),
                    connector,
                ))
            },
        )))
    }
}
