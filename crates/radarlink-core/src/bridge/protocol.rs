//! Board-level protocol shim

use super::{Bridge, ControlChannel, DataChannel};
use crate::component::ComponentAddress;
use crate::error::{LinkError, ProtocolError, Result};
use crate::vendor::functions::{
    BOARD_INFO_LEN, BOARD_UUID_LEN, FN_BOARD_INFO, FN_BOARD_UUID, FN_ERROR_INFO, FN_VERSION_INFO,
    VERSION_INFO_LEN,
};
use crate::vendor::VendorCommands;
use core::fmt;
use std::sync::Arc;

/// Identity reported by a board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    /// USB-style vendor id
    pub vid: u16,
    /// USB-style product id
    pub pid: u16,
    /// Board name
    pub name: String,
}

impl BoardInfo {
    /// Decode a board info answer
    pub fn parse(bytes: &[u8]) -> core::result::Result<Self, ProtocolError> {
        if bytes.len() < 4 {
            return Err(ProtocolError::Malformed("board info shorter than ids"));
        }
        let vid = u16::from_le_bytes([bytes[0], bytes[1]]);
        let pid = u16::from_le_bytes([bytes[2], bytes[3]]);
        let name = &bytes[4..];
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        let name = String::from_utf8_lossy(&name[..end]).trim().to_string();
        Ok(Self { vid, pid, name })
    }

    /// Encode as sent by firmware (fixed length, NUL padded)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BOARD_INFO_LEN);
        out.extend_from_slice(&self.vid.to_le_bytes());
        out.extend_from_slice(&self.pid.to_le_bytes());
        let name = self.name.as_bytes();
        let room = BOARD_INFO_LEN - 4 - 1;
        out.extend_from_slice(&name[..name.len().min(room)]);
        out.resize(BOARD_INFO_LEN, 0);
        out
    }
}

/// Firmware version of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionInfo {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch level
    pub patch: u16,
    /// Build number
    pub build: u16,
}

impl VersionInfo {
    fn parse(bytes: &[u8; VERSION_INFO_LEN]) -> Self {
        let word = |i: usize| u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
        Self {
            major: word(0),
            minor: word(1),
            patch: word(2),
            build: word(3),
        }
    }

    /// Encode as sent by firmware
    pub fn encode(&self) -> [u8; VERSION_INFO_LEN] {
        let mut out = [0u8; VERSION_INFO_LEN];
        for (i, word) in [self.major, self.minor, self.patch, self.build]
            .into_iter()
            .enumerate()
        {
            out[2 * i..2 * i + 2].copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// Bridge adding board-level queries to a wrapped bridge
///
/// Connection state, open and close are forwarded to the wrapped bridge.
pub struct ProtocolBridge<B: Bridge> {
    inner: B,
}

impl<B: Bridge> ProtocolBridge<B> {
    /// Wrap `inner`
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// The wrapped bridge
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn board(&self) -> Result<VendorCommands> {
        let control = self.inner.control().ok_or(LinkError::Unavailable)?;
        Ok(VendorCommands::new(control, ComponentAddress::BOARD))
    }

    /// Board identity
    pub fn board_info(&self) -> Result<BoardInfo> {
        let mut buf = [0u8; BOARD_INFO_LEN];
        self.board()?.transfer_checked(FN_BOARD_INFO, &[], &mut buf)?;
        Ok(BoardInfo::parse(&buf)?)
    }

    /// Firmware version
    pub fn version_info(&self) -> Result<VersionInfo> {
        let mut buf = [0u8; VERSION_INFO_LEN];
        self.board()?.transfer_checked(FN_VERSION_INFO, &[], &mut buf)?;
        Ok(VersionInfo::parse(&buf))
    }

    /// Fail with [`ProtocolError::FirmwareTooOld`] if the firmware is older than `min`
    pub fn check_version(&self, min: VersionInfo) -> Result<VersionInfo> {
        let version = self.version_info()?;
        if version < min {
            log::warn!(
                "{}: firmware {} older than required {}",
                self.inner.name(),
                version,
                min
            );
            return Err(ProtocolError::FirmwareTooOld {
                required: min,
                found: version,
            }
            .into());
        }
        Ok(version)
    }

    /// Unique board id
    pub fn uuid(&self) -> Result<[u8; BOARD_UUID_LEN]> {
        let mut buf = [0u8; BOARD_UUID_LEN];
        self.board()?.transfer_checked(FN_BOARD_UUID, &[], &mut buf)?;
        Ok(buf)
    }

    /// Largest single transfer of the control link
    pub fn max_transfer(&self) -> Result<usize> {
        let control = self.inner.control().ok_or(LinkError::Unavailable)?;
        Ok(control.max_transfer_size())
    }

    /// Last error recorded by the firmware
    pub fn error_info(&self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.board()?.transfer_checked(FN_ERROR_INFO, &[], &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<B: Bridge> Bridge for ProtocolBridge<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&self) -> core::result::Result<(), LinkError> {
        self.inner.open()
    }

    fn close(&self) {
        self.inner.close()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn control(&self) -> Option<Arc<ControlChannel>> {
        self.inner.control()
    }

    fn data(&self) -> Option<Arc<dyn DataChannel>> {
        self.inner.data()
    }
}
