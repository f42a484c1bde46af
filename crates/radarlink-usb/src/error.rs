//! Error types for the USB transport

use nusb::transfer::TransferError;
use radarlink_core::LinkError;
use thiserror::Error;

/// Result type for USB operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors while locating and claiming a board
#[derive(Debug, Error)]
pub enum UsbError {
    /// No device matched the configuration
    #[error("no matching USB board found")]
    DeviceNotFound,
    /// The device could not be opened
    #[error("failed to open USB device: {0}")]
    OpenFailed(String),
    /// The vendor interface could not be claimed
    #[error("failed to claim interface: {0}")]
    ClaimFailed(String),
    /// A bulk transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
}

impl UsbError {
    /// Whether this is a transfer cancelled at its timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, UsbError::TransferFailed(TransferError::Cancelled))
    }
}

impl From<nusb::Error> for UsbError {
    fn from(e: nusb::Error) -> Self {
        UsbError::OpenFailed(e.to_string())
    }
}

impl From<&UsbError> for LinkError {
    fn from(e: &UsbError) -> Self {
        if e.is_timeout() {
            LinkError::Timeout
        } else {
            LinkError::Unavailable
        }
    }
}
