//! Streamed frames from the emulated board
//!
//! Every frame starts with a little-endian `u32` sequence number followed
//! by a byte ramp seeded with that number, so consumers can check both
//! ordering and contents.

use crate::SharedBoard;
use parking_lot::Mutex;
use radarlink_core::bridge::DataChannel;
use radarlink_core::frame::{FrameInfo, FrameSource};
use radarlink_core::link::CloseSignal;
use radarlink_core::LinkError;
use std::time::Duration;

/// Data channel of the emulated board
pub struct MockDataChannel {
    board: SharedBoard,
    sources: Mutex<Vec<CloseSignal>>,
}

impl MockDataChannel {
    /// Data channel of `board`
    pub fn new(board: SharedBoard) -> Self {
        Self {
            board,
            sources: Mutex::new(Vec::new()),
        }
    }
}

impl DataChannel for MockDataChannel {
    fn open_source(&self, frame_size: usize) -> Result<Box<dyn FrameSource>, LinkError> {
        let (frame_len, interval) = {
            let board = self.board.lock();
            if board.is_unavailable() {
                return Err(LinkError::Unavailable);
            }
            (board.config().frame_len, board.config().frame_interval)
        };
        let signal = CloseSignal::new();
        self.sources.lock().push(signal.clone());
        Ok(Box::new(MockFrameSource {
            frame_len: frame_len.min(frame_size),
            interval,
            sequence: 0,
            signal,
        }))
    }

    fn close(&self) {
        for signal in self.sources.lock().drain(..) {
            signal.close();
        }
    }
}

/// Endless producer of numbered frames
pub struct MockFrameSource {
    frame_len: usize,
    interval: Duration,
    sequence: u32,
    signal: CloseSignal,
}

impl FrameSource for MockFrameSource {
    fn receive_frame(&mut self, buf: &mut [u8]) -> Result<FrameInfo, LinkError> {
        self.signal.sleep(self.interval)?;
        let len = self.frame_len.min(buf.len());
        fill_frame(self.sequence, &mut buf[..len]);
        let info = FrameInfo {
            offset: 0,
            size: len,
            status: 0,
        };
        self.sequence = self.sequence.wrapping_add(1);
        Ok(info)
    }
}

/// Write frame `sequence` into `buf`
pub fn fill_frame(sequence: u32, buf: &mut [u8]) {
    let header = sequence.to_le_bytes();
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = match header.get(i) {
            Some(&b) => b,
            None => (sequence as usize).wrapping_add(i) as u8,
        };
    }
}

/// Sequence number of a frame, if it passes the content check
pub fn check_frame(data: &[u8]) -> Option<u32> {
    let sequence = u32::from_le_bytes(data.get(..4)?.try_into().ok()?);
    let ok = data
        .iter()
        .enumerate()
        .skip(4)
        .all(|(i, &b)| b == (sequence as usize).wrapping_add(i) as u8);
    ok.then_some(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shared, MockBoard};

    #[test]
    fn test_frame_content() {
        let mut buf = [0u8; 12];
        fill_frame(0x0102_0304, &mut buf);
        assert_eq!(&buf[..4], &[4, 3, 2, 1]);
        assert_eq!(check_frame(&buf), Some(0x0102_0304));
        buf[9] ^= 0xFF;
        assert_eq!(check_frame(&buf), None);
        assert_eq!(check_frame(&buf[..3]), None);
    }

    #[test]
    fn test_close_ends_sources() {
        let channel = MockDataChannel::new(shared(MockBoard::new_default()));
        let mut source = channel.open_source(64).unwrap();
        let mut buf = [0u8; 64];

        let info = source.receive_frame(&mut buf).unwrap();
        assert_eq!(info.size, 64);
        assert_eq!(check_frame(&buf), Some(0));

        channel.close();
        assert_eq!(source.receive_frame(&mut buf), Err(LinkError::Closed));
    }
}
