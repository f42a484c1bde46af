//! Streamed frames over the board's data port
//!
//! Opening a source sends one empty datagram to the data port so the board
//! learns where to stream. Every following datagram is one frame: a
//! little-endian `u32` status word followed by the frame data.

use crate::link::{bind_for, link_error, SLICE};
use parking_lot::Mutex;
use radarlink_core::bridge::DataChannel;
use radarlink_core::frame::{FrameInfo, FrameSource};
use radarlink_core::link::CloseSignal;
use radarlink_core::LinkError;
use std::net::{SocketAddr, UdpSocket};

/// Bytes in front of the data of every frame datagram
pub const FRAME_HEADER_LEN: usize = 4;

/// Data channel of an Ethernet board
pub struct UdpDataChannel {
    address: SocketAddr,
    sources: Mutex<Vec<CloseSignal>>,
}

impl UdpDataChannel {
    /// Data channel streaming from `address`
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            sources: Mutex::new(Vec::new()),
        }
    }
}

impl DataChannel for UdpDataChannel {
    fn open_source(&self, frame_size: usize) -> Result<Box<dyn FrameSource>, LinkError> {
        let socket = bind_for(&self.address)
            .and_then(|socket| {
                socket.connect(self.address)?;
                socket.set_read_timeout(Some(SLICE))?;
                socket.send(&[])?;
                Ok(socket)
            })
            .map_err(|e| {
                log::warn!("udp:{}: cannot open data socket: {}", self.address, e);
                LinkError::Unavailable
            })?;
        log::debug!(
            "udp:{}: data source open, frames up to {} bytes",
            self.address,
            frame_size
        );

        let signal = CloseSignal::new();
        let mut sources = self.sources.lock();
        sources.retain(|s| !s.is_closed());
        sources.push(signal.clone());
        drop(sources);
        Ok(Box::new(UdpFrameSource { socket, signal }))
    }

    fn close(&self) {
        for signal in self.sources.lock().drain(..) {
            signal.close();
        }
    }
}

/// Receives frame datagrams from one board
pub struct UdpFrameSource {
    socket: UdpSocket,
    signal: CloseSignal,
}

impl Drop for UdpFrameSource {
    fn drop(&mut self) {
        // lets the channel forget us on its next open
        self.signal.close();
    }
}

impl FrameSource for UdpFrameSource {
    fn receive_frame(&mut self, buf: &mut [u8]) -> Result<FrameInfo, LinkError> {
        self.signal.check()?;
        let n = self.socket.recv(buf).map_err(|e| link_error(&e))?;
        self.signal.check()?;
        if n < FRAME_HEADER_LEN {
            log::warn!("discarding {} byte datagram without frame header", n);
            return Err(LinkError::Timeout);
        }
        Ok(FrameInfo {
            offset: FRAME_HEADER_LEN,
            size: n - FRAME_HEADER_LEN,
            status: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frames_from_board_socket() {
        let board = UdpSocket::bind("127.0.0.1:0").unwrap();
        board
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let channel = UdpDataChannel::new(board.local_addr().unwrap());
        let mut source = channel.open_source(64).unwrap();

        // the hello datagram tells the board where to stream
        let mut hello = [0u8; 8];
        let (n, host) = board.recv_from(&mut hello).unwrap();
        assert_eq!(n, 0);

        board.send_to(&[7, 0, 0, 0, 0xAA, 0xBB], host).unwrap();
        board.send_to(&[1, 2], host).unwrap();

        let mut buf = [0u8; 64];
        let info = source.receive_frame(&mut buf).unwrap();
        assert_eq!(info.status, 7);
        assert_eq!(&buf[info.offset..info.offset + info.size], &[0xAA, 0xBB]);

        // runt datagrams are skipped
        assert_eq!(source.receive_frame(&mut buf), Err(LinkError::Timeout));

        channel.close();
        assert_eq!(source.receive_frame(&mut buf), Err(LinkError::Closed));
    }

    #[test]
    fn test_dropped_sources_are_forgotten() {
        let board = UdpSocket::bind("127.0.0.1:0").unwrap();
        let channel = UdpDataChannel::new(board.local_addr().unwrap());

        for _ in 0..10 {
            let source = channel.open_source(64).unwrap();
            drop(source);
        }
        let kept = channel.open_source(64).unwrap();
        assert_eq!(channel.sources.lock().len(), 1);

        channel.close();
        assert!(channel.sources.lock().is_empty());
        drop(kept);
    }
}
