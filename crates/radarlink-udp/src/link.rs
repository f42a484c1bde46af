//! Control link over a connected UDP socket

use crate::UdpConfig;
use radarlink_core::link::{check_transfer_size, CloseSignal, LinkState, TransportLink};
use radarlink_core::LinkError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Largest datagram that fits one Ethernet frame without fragmentation
pub const MAX_TRANSFER: usize = 1472;

/// Length of one blocking receive before the close signal is checked
pub(crate) const SLICE: Duration = Duration::from_millis(50);

/// UDP control link to one board
pub struct UdpLink {
    config: UdpConfig,
    path: String,
    socket: Option<UdpSocket>,
    signal: CloseSignal,
}

impl UdpLink {
    /// Link to the board described by `config`, not yet opened
    pub fn new(config: UdpConfig) -> Self {
        Self {
            path: format!("udp:{}", config.control_address()),
            config,
            socket: None,
            signal: CloseSignal::new(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    fn socket(&self) -> Result<&UdpSocket, LinkError> {
        self.socket.as_ref().ok_or(LinkError::Closed)
    }
}

/// Bind an ephemeral local socket of the same family as `peer`
pub(crate) fn bind_for(peer: &SocketAddr) -> io::Result<UdpSocket> {
    match peer {
        SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

/// Map a socket error to the link error it means for callers
pub(crate) fn link_error(e: &io::Error) -> LinkError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => LinkError::Timeout,
        _ => LinkError::Unavailable,
    }
}

impl TransportLink for UdpLink {
    fn path(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> Result<(), LinkError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let peer = self.config.control_address();
        let socket = bind_for(&peer)
            .and_then(|socket| {
                socket.connect(peer)?;
                socket.set_read_timeout(Some(SLICE))?;
                socket.set_write_timeout(Some(self.config.timeout))?;
                Ok(socket)
            })
            .map_err(|e| {
                log::warn!("{}: cannot open socket: {}", self.path, e);
                LinkError::Unavailable
            })?;
        log::debug!(
            "{}: bound {}",
            self.path,
            socket
                .local_addr()
                .map_or_else(|_| "?".to_string(), |a| a.to_string())
        );
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn state(&self) -> LinkState {
        if self.socket.is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    fn max_transfer_size(&self) -> usize {
        MAX_TRANSFER
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        check_transfer_size(data.len(), MAX_TRANSFER)?;
        let socket = self.socket()?;
        self.signal.check()?;
        let result = socket.send(data);
        // a close that raced with the send wins over its outcome
        self.signal.check()?;
        match result {
            Ok(n) if n == data.len() => Ok(()),
            Ok(_) => Err(LinkError::Unavailable),
            Err(e) => {
                log::debug!("{}: send failed: {}", self.path, e);
                Err(link_error(&e))
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let socket = self.socket()?;
        self.signal.run_sliced(self.config.timeout, SLICE, |step| {
            socket.set_read_timeout(Some(step)).map_err(|e| link_error(&e))?;
            socket.recv(buf).map_err(|e| link_error(&e))
        })
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}
