//! Error types for radarlink-core
//!
//! Errors are split by layer: [`LinkError`] for the byte transport,
//! [`ProtocolError`] for the vendor command protocol and [`PoolError`] for
//! frame buffer contention. [`Error`] wraps all three and adds the
//! component address and function id of the command that failed.

use crate::bridge::VersionInfo;
use crate::component::ComponentAddress;
use thiserror::Error;

/// Transport-level failure. Never retried by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The underlying channel could not be claimed or reached
    #[error("link unavailable")]
    Unavailable,
    /// A blocking send or receive did not complete within the link timeout
    #[error("link timed out")]
    Timeout,
    /// A single transfer exceeds the link's maximum transfer size
    #[error("payload of {len} bytes exceeds maximum transfer size of {max} bytes")]
    PayloadTooLarge {
        /// Requested transfer length
        len: usize,
        /// Link maximum transfer size
        max: usize,
    },
    /// The link was closed, possibly while an operation was in flight
    #[error("link closed")]
    Closed,
}

/// Vendor protocol failure reported by, or detected in answers from, a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The device answered with a non-zero status word
    #[error("device rejected command with status {0:#06x}")]
    DeviceRejected(u16),
    /// The device returned fewer bytes than requested
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes received
        actual: usize,
    },
    /// The answer could not be decoded
    #[error("malformed response: {0}")]
    Malformed(&'static str),
    /// The board firmware is older than the caller requires
    #[error("firmware {found} older than required {required}")]
    FirmwareTooOld {
        /// Lowest acceptable version
        required: VersionInfo,
        /// Version the board reported
        found: VersionInfo,
    },
}

/// Frame pool contention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The operation needs every frame to be free, but some are outstanding
    #[error("frame pool busy: {outstanding} frame(s) outstanding")]
    Busy {
        /// Frames held outside the pool at the time of the call
        outstanding: usize,
    },
    /// Every frame is currently outstanding
    #[error("frame pool exhausted")]
    Exhausted,
    /// Data placement reaches past the end of the frame buffer
    #[error("frame data ends at {end}, buffer holds {capacity} bytes")]
    OutOfBounds {
        /// End of the requested data range
        end: usize,
        /// Frame buffer capacity
        capacity: usize,
    },
}

/// Top-level error for operations of this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Protocol failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Frame pool failure
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// A vendor command failed; carries the command's address
    #[error("{address} function {function_id:#04x}: {source}")]
    Command {
        /// Address of the component the command was sent to
        address: ComponentAddress,
        /// Function id of the failed command
        function_id: u8,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach command context to an error
    pub fn in_command(self, address: ComponentAddress, function_id: u8) -> Self {
        Error::Command {
            address,
            function_id,
            source: Box::new(self),
        }
    }

    /// Strip command context and return the innermost error
    pub fn root(&self) -> &Error {
        match self {
            Error::Command { source, .. } => source.root(),
            other => other,
        }
    }

    /// The innermost link error, if this is one
    pub fn link(&self) -> Option<LinkError> {
        match self.root() {
            Error::Link(e) => Some(*e),
            _ => None,
        }
    }

    /// The innermost protocol error, if this is one
    pub fn protocol(&self) -> Option<ProtocolError> {
        match self.root() {
            Error::Protocol(e) => Some(*e),
            _ => None,
        }
    }

    /// The innermost pool error, if this is one
    pub fn pool(&self) -> Option<PoolError> {
        match self.root() {
            Error::Pool(e) => Some(*e),
            _ => None,
        }
    }
}

/// Result type alias using the crate [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentKind, SubInterface};

    #[test]
    fn test_command_context_unwraps_to_root() {
        let address = ComponentKind::RadarAvian.address(0, SubInterface::Protocol);
        let err = Error::from(ProtocolError::DeviceRejected(2)).in_command(address, 0x11);

        assert_eq!(err.protocol(), Some(ProtocolError::DeviceRejected(2)));
        assert_eq!(err.link(), None);
        let msg = err.to_string();
        assert!(msg.contains("0x11"), "{msg}");
        assert!(msg.contains("0x0002"), "{msg}");
    }

    #[test]
    fn test_link_error_display() {
        let err = LinkError::PayloadTooLarge { len: 2000, max: 1472 };
        assert_eq!(
            err.to_string(),
            "payload of 2000 bytes exceeds maximum transfer size of 1472 bytes"
        );
    }
}
