//! Transport link talking to a [`MockBoard`](crate::MockBoard) in memory

use crate::SharedBoard;
use radarlink_core::link::{check_transfer_size, CloseSignal, LinkState, TransportLink};
use radarlink_core::LinkError;
use std::time::Duration;

/// Default send and receive timeout of the mock link
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

const POLL_SLICE: Duration = Duration::from_millis(2);

/// In-memory link to an emulated board
pub struct MockLink {
    board: SharedBoard,
    path: String,
    state: LinkState,
    signal: CloseSignal,
    timeout: Duration,
    max_transfer: usize,
}

impl MockLink {
    /// Link to `board`, not yet opened
    pub fn new(board: SharedBoard) -> Self {
        let (path, max_transfer) = {
            let board = board.lock();
            (
                format!("mock:{}", board.config().info.name),
                board.config().max_transfer,
            )
        };
        Self {
            board,
            path,
            state: LinkState::Closed,
            signal: CloseSignal::new(),
            timeout: DEFAULT_TIMEOUT,
            max_transfer,
        }
    }

    /// Change the send and receive timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TransportLink for MockLink {
    fn path(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> Result<(), LinkError> {
        if self.state == LinkState::Open {
            return Ok(());
        }
        if self.board.lock().is_unavailable() {
            return Err(LinkError::Unavailable);
        }
        self.state = LinkState::Open;
        Ok(())
    }

    fn close(&mut self) {
        self.state = LinkState::Closed;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn max_transfer_size(&self) -> usize {
        self.max_transfer
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        if self.state != LinkState::Open {
            return Err(LinkError::Closed);
        }
        check_transfer_size(data.len(), self.max_transfer)?;
        if self.board.lock().take_send_failure() {
            log::debug!("{}: request transfer lost", self.path);
            return Err(LinkError::Timeout);
        }
        let board = &self.board;
        let signal = &self.signal;
        let path = &self.path;
        self.signal.run_sliced(self.timeout, POLL_SLICE, |step| {
            let mut board = board.lock();
            if board.sends_stalled() {
                drop(board);
                signal.sleep(step)?;
                return Err(LinkError::Timeout);
            }
            if let Err(e) = board.handle_request(data) {
                log::warn!("{}: board dropped request: {}", path, e);
            }
            Ok(())
        })
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.state != LinkState::Open {
            return Err(LinkError::Closed);
        }
        let board = &self.board;
        let signal = &self.signal;
        self.signal.run_sliced(self.timeout, POLL_SLICE, |step| {
            let response = board.lock().take_response();
            match response {
                Some(response) => {
                    // datagram semantics: excess bytes are lost
                    let n = response.len().min(buf.len());
                    buf[..n].copy_from_slice(&response[..n]);
                    Ok(n)
                }
                None => {
                    signal.sleep(step)?;
                    Err(LinkError::Timeout)
                }
            }
        })
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}
