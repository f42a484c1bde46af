//! Emulated Ethernet board on a localhost UDP socket
//!
//! Datagrams are fed to a [`MockBoard`](crate::MockBoard) and its responses
//! are sent back to the sender, so the UDP transport and discovery can be
//! tested without hardware.

use crate::SharedBoard;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(20);

/// A board answering on a UDP socket until dropped
pub struct MockUdpBoard {
    address: SocketAddr,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MockUdpBoard {
    /// Serve `board` on an ephemeral localhost port
    pub fn spawn(board: SharedBoard) -> io::Result<Self> {
        Self::spawn_with_delay(board, Duration::ZERO)
    }

    /// Serve `board`, holding every answer back for `delay`
    pub fn spawn_with_delay(board: SharedBoard, delay: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(POLL))?;
        let address = socket.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let stop = stop.clone();
            thread::Builder::new()
                .name(format!("mock-udp-{}", address.port()))
                .spawn(move || serve(socket, board, delay, stop))?
        };
        log::debug!("mock board listening on {}", address);

        Ok(Self {
            address,
            stop,
            worker: Some(worker),
        })
    }

    /// Address the board listens on
    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl Drop for MockUdpBoard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn serve(socket: UdpSocket, board: SharedBoard, delay: Duration, stop: Arc<AtomicBool>) {
    let mut buf = vec![0u8; 65536];
    while !stop.load(Ordering::Acquire) {
        let (n, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue
            }
            Err(e) => {
                log::warn!("mock udp board: {}", e);
                return;
            }
        };

        let responses: Vec<Vec<u8>> = {
            let mut board = board.lock();
            if let Err(e) = board.handle_request(&buf[..n]) {
                log::warn!("mock udp board: dropped request from {}: {}", peer, e);
            }
            std::iter::from_fn(|| board.take_response()).collect()
        };
        if !responses.is_empty() && !delay.is_zero() {
            thread::sleep(delay);
        }
        for response in responses {
            if let Err(e) = socket.send_to(&response, peer) {
                log::warn!("mock udp board: send to {} failed: {}", peer, e);
            }
        }
    }
}
