//! Control channel: serialized access to a link

use crate::error::LinkError;
use crate::link::{CloseSignal, LinkState, TransportLink};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Request/response channel over one link
///
/// Every logical command runs inside a [`Transaction`], which holds the
/// channel lock until it is dropped.
pub struct ControlChannel {
    path: String,
    link: Mutex<Box<dyn TransportLink>>,
    signal: CloseSignal,
    max_transfer: AtomicUsize,
}

impl ControlChannel {
    /// Wrap a link. The link is not opened.
    pub fn new(link: Box<dyn TransportLink>) -> Self {
        Self {
            path: link.path().to_string(),
            signal: link.close_signal(),
            max_transfer: AtomicUsize::new(link.max_transfer_size()),
            link: Mutex::new(link),
        }
    }

    /// Path of the underlying link
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Open the link and cache its transfer limit
    pub fn open(&self) -> Result<(), LinkError> {
        let mut link = self.link.lock();
        if link.state() == LinkState::Open {
            return Ok(());
        }
        self.signal.reset();
        link.open()?;
        self.max_transfer
            .store(link.max_transfer_size(), Ordering::Release);
        log::info!(
            "{}: opened (max transfer {} bytes)",
            self.path,
            link.max_transfer_size()
        );
        Ok(())
    }

    /// Close the link, unblocking a transaction in flight
    pub fn close(&self) {
        // signal first: the lock may be held by a blocked transaction
        self.signal.close();
        let mut link = self.link.lock();
        if link.state() == LinkState::Open {
            link.close();
            log::info!("{}: closed", self.path);
        }
    }

    /// Whether the link is open
    pub fn is_open(&self) -> bool {
        match self.link.try_lock() {
            Some(link) => link.state() == LinkState::Open,
            // a transaction is running on an open link unless close is pending
            None => !self.signal.is_closed(),
        }
    }

    /// Cached maximum transfer size of the link
    pub fn max_transfer_size(&self) -> usize {
        self.max_transfer.load(Ordering::Acquire)
    }

    /// Start one logical command
    pub fn transaction(&self) -> Result<Transaction<'_>, LinkError> {
        self.signal.check()?;
        let link = self.link.lock();
        if link.state() != LinkState::Open {
            return Err(LinkError::Closed);
        }
        Ok(Transaction {
            link,
            signal: &self.signal,
        })
    }
}

/// Exclusive use of a control channel for one logical command
pub struct Transaction<'a> {
    link: MutexGuard<'a, Box<dyn TransportLink>>,
    signal: &'a CloseSignal,
}

impl Transaction<'_> {
    /// Maximum size of one transfer
    pub fn max_transfer_size(&self) -> usize {
        self.link.max_transfer_size()
    }

    /// Send one transfer
    pub fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.signal.check()?;
        self.link.send(data)
    }

    /// Receive one transfer
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        self.signal.check()?;
        self.link.receive(buf)
    }
}
