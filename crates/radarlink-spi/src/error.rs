//! spidev link failures

use radarlink_core::LinkError;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Controller setting written while opening the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Mode,
    BitsPerWord,
    MaxSpeedHz,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Setting::Mode => "SPI mode",
            Setting::BitsPerWord => "bits per word",
            Setting::MaxSpeedHz => "max speed",
        })
    }
}

/// Which half of a request/response exchange a transfer belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Request,
    Poll,
    Body,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Request => "request",
            Phase::Poll => "response poll",
            Phase::Body => "response body",
        })
    }
}

#[derive(Debug, Error)]
pub enum SpiError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// One of the `SPI_IOC_WR_*` ioctls was refused by the controller
    #[error("controller refused {setting} = {value}: {source}")]
    Configure {
        setting: Setting,
        value: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// `SPI_IOC_MESSAGE` failed
    #[error("{phase} transfer of {len} bytes failed: {source}")]
    Transfer {
        phase: Phase,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// The board kept shifting out idle bytes for the whole timeout
    #[error("no response after {polls} polls in {waited:?} (last byte {last:#04x})")]
    NoResponse {
        polls: u32,
        waited: Duration,
        last: u8,
    },
}

impl SpiError {
    /// The node does not exist or we may not open it
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SpiError::Open { source, .. }
                if matches!(source.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied)
        )
    }
}

impl From<&SpiError> for LinkError {
    fn from(e: &SpiError) -> Self {
        match e {
            SpiError::NoResponse { .. } => LinkError::Timeout,
            SpiError::Transfer { source, .. } if source.kind() == io::ErrorKind::TimedOut => {
                LinkError::Timeout
            }
            _ => LinkError::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpiError>;
