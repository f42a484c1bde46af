//! Transport link abstraction
//!
//! A [`TransportLink`] is a raw byte connection to one physical channel: a
//! USB endpoint pair, a UDP socket, a SPI bus. Links are owned by exactly
//! one bridge and used from one thread at a time; the bridge serializes
//! access.
//!
//! Blocking operations are bounded by a link timeout. Every link also owns
//! a [`CloseSignal`] which another thread may trigger to make a blocked
//! `send` or `receive` return [`LinkError::Closed`].

use crate::error::LinkError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Connection state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not connected; send and receive fail with [`LinkError::Closed`]
    Closed,
    /// Connected and usable
    Open,
}

/// Raw byte-level connection to one physical channel
pub trait TransportLink: Send {
    /// Human readable identity (device path, socket address, bus location)
    fn path(&self) -> &str;

    /// Claim the underlying channel
    ///
    /// Fails with [`LinkError::Unavailable`] if the channel is busy or
    /// unreachable. Opening an open link is a no-op.
    fn open(&mut self) -> Result<(), LinkError>;

    /// Release the underlying channel. Idempotent.
    fn close(&mut self);

    /// Current connection state
    fn state(&self) -> LinkState;

    /// Largest number of bytes a single `send` or `receive` may carry
    fn max_transfer_size(&self) -> usize;

    /// Send one transfer, blocking until done or timed out
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError>;

    /// Receive one transfer into `buf`, returning the number of bytes read
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Cancellation token shared with whoever may close this link
    fn close_signal(&self) -> CloseSignal;
}

impl TransportLink for Box<dyn TransportLink> {
    fn path(&self) -> &str {
        (**self).path()
    }

    fn open(&mut self) -> Result<(), LinkError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> LinkState {
        (**self).state()
    }

    fn max_transfer_size(&self) -> usize {
        (**self).max_transfer_size()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        (**self).receive(buf)
    }

    fn close_signal(&self) -> CloseSignal {
        (**self).close_signal()
    }
}

/// Fail fast if `len` exceeds the link limit
pub fn check_transfer_size(len: usize, max: usize) -> Result<(), LinkError> {
    if len > max {
        return Err(LinkError::PayloadTooLarge { len, max });
    }
    Ok(())
}

/// Cloneable cancellation token for blocking link I/O
///
/// A closed signal stays closed until [`CloseSignal::reset`] is called,
/// which links do when they are reopened.
#[derive(Clone, Default)]
pub struct CloseSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    closed: Mutex<bool>,
    cond: Condvar,
}

impl CloseSignal {
    /// Create an open (not yet signalled) token
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal close and wake every waiter
    pub fn close(&self) {
        let mut closed = self.inner.closed.lock();
        *closed = true;
        self.inner.cond.notify_all();
    }

    /// Clear the signal for a reopened link
    pub fn reset(&self) {
        *self.inner.closed.lock() = false;
    }

    /// Whether close was signalled
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Return `Err(Closed)` if close was signalled
    pub fn check(&self) -> Result<(), LinkError> {
        if self.is_closed() {
            Err(LinkError::Closed)
        } else {
            Ok(())
        }
    }

    /// Sleep for up to `timeout`, waking early on close
    ///
    /// Returns `Err(Closed)` if the signal fired.
    pub fn sleep(&self, timeout: Duration) -> Result<(), LinkError> {
        let deadline = Instant::now() + timeout;
        let mut closed = self.inner.closed.lock();
        while !*closed {
            if self.inner.cond.wait_until(&mut closed, deadline).timed_out() {
                break;
            }
        }
        if *closed {
            Err(LinkError::Closed)
        } else {
            Ok(())
        }
    }

    /// Run a blocking operation in bounded slices until it completes
    ///
    /// `op` is called with the slice length and must return
    /// `Err(LinkError::Timeout)` when one slice elapsed without progress.
    /// Between slices the signal is checked. Gives up with `Timeout` once
    /// `timeout` has elapsed overall.
    pub fn run_sliced<T>(
        &self,
        timeout: Duration,
        slice: Duration,
        mut op: impl FnMut(Duration) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Err(LinkError::Timeout);
            }
            let step = slice.min(deadline - now).max(Duration::from_millis(1));
            match op(step) {
                Err(LinkError::Timeout) => continue,
                other => {
                    // close during the slice wins over its result
                    if let Err(LinkError::Closed) = self.check() {
                        return Err(LinkError::Closed);
                    }
                    return other;
                }
            }
        }
    }
}

impl core::fmt::Debug for CloseSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CloseSignal")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_check_transfer_size() {
        assert!(check_transfer_size(64, 64).is_ok());
        assert_eq!(
            check_transfer_size(65, 64),
            Err(LinkError::PayloadTooLarge { len: 65, max: 64 })
        );
    }

    #[test]
    fn test_sleep_wakes_on_close() {
        let signal = CloseSignal::new();
        let remote = signal.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || remote.sleep(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        signal.close();
        assert_eq!(handle.join().unwrap(), Err(LinkError::Closed));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_times_out_when_open() {
        let signal = CloseSignal::new();
        assert_eq!(signal.sleep(Duration::from_millis(5)), Ok(()));
    }

    #[test]
    fn test_run_sliced_gives_up_after_timeout() {
        let signal = CloseSignal::new();
        let mut calls = 0;
        let result: Result<(), _> =
            signal.run_sliced(Duration::from_millis(30), Duration::from_millis(5), |step| {
                calls += 1;
                thread::sleep(step);
                Err(LinkError::Timeout)
            });
        assert_eq!(result, Err(LinkError::Timeout));
        assert!(calls >= 2);
    }

    #[test]
    fn test_run_sliced_stops_on_close() {
        let signal = CloseSignal::new();
        signal.close();
        let result: Result<(), _> =
            signal.run_sliced(Duration::from_secs(1), Duration::from_millis(5), |_| Ok(()));
        assert_eq!(result, Err(LinkError::Closed));

        signal.reset();
        assert!(!signal.is_closed());
    }
}
