//! radarlink-usb - USB transport for radar boards
//!
//! USB boards expose a vendor-class interface with bulk endpoints for
//! control requests and a third bulk endpoint streaming frames. This crate
//! provides the [`UsbLink`], the [`UsbDataChannel`], the bridge combining
//! both, and the bus-scanning [`UsbEnumerator`].
//!
//! # Board options
//!
//! - `vid=<id>`, `pid=<id>`: board ids (decimal or `0x` hex; both or
//!   neither). Without them every USB board in the database matches.
//! - `serial=<string>`: serial number of the board to open
//! - `timeout=<ms>`: control timeout, default 1000

mod device;
mod enumerate;
mod error;
pub mod protocol;

pub use device::{UsbDataChannel, UsbFrameSource, UsbLink};
pub use enumerate::UsbEnumerator;
pub use error::{Result, UsbError};

use core::fmt;
use radarlink_core::board::{BoardDatabase, BoardDescriptor, Connector, TransportFamily, TransportId};
use radarlink_core::bridge::{Bridge, ControlChannel, LinkBridge};
use radarlink_core::LinkError;
use std::sync::Arc;
use std::time::Duration;

/// Default control timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(protocol::USB_TIMEOUT_MS);

/// Which USB device to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbConfig {
    /// Accepted vendor/product id pairs
    pub ids: Vec<(u16, u16)>,
    /// Required serial number
    pub serial: Option<String>,
    /// Required bus id and device address
    pub location: Option<(String, u8)>,
    /// Control timeout
    pub timeout: Duration,
}

impl Default for UsbConfig {
    /// Any USB board of the built-in database
    fn default() -> Self {
        Self {
            ids: BoardDatabase::builtin().ids_for(TransportFamily::Usb),
            serial: None,
            location: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UsbConfig {
    /// Whether a device with these properties should be opened
    pub fn matches(
        &self,
        vid: u16,
        pid: u16,
        serial: Option<&str>,
        bus_id: &str,
        address: u8,
    ) -> bool {
        if !self.ids.contains(&(vid, pid)) {
            return false;
        }
        if let Some(wanted) = &self.serial {
            if serial != Some(wanted.as_str()) {
                return false;
            }
        }
        match &self.location {
            Some((bus, addr)) => bus == bus_id && *addr == address,
            None => true,
        }
    }
}

impl fmt::Display for UsbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.location, &self.serial, self.ids.as_slice()) {
            (Some((bus, address)), _, _) => write!(f, "{}:{}", bus, address),
            (None, Some(serial), _) => write!(f, "serial={}", serial),
            (None, None, [(vid, pid)]) => write!(f, "{:04x}:{:04x}", vid, pid),
            (None, None, _) => write!(f, "any"),
        }
    }
}

/// Parse `key=value` board options into a [`UsbConfig`]
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<UsbConfig, String> {
    let mut config = UsbConfig::default();
    let mut vid = None;
    let mut pid = None;

    for (key, value) in options {
        match *key {
            "vid" => {
                vid = Some(
                    protocol::parse_u16(value)
                        .ok_or_else(|| format!("Invalid vid value: {}", value))?,
                );
            }
            "pid" => {
                pid = Some(
                    protocol::parse_u16(value)
                        .ok_or_else(|| format!("Invalid pid value: {}", value))?,
                );
            }
            "serial" => {
                if value.is_empty() {
                    return Err("serial must not be empty".to_string());
                }
                config.serial = Some(value.to_string());
            }
            "timeout" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                if ms == 0 {
                    return Err("timeout must be at least 1 ms".to_string());
                }
                config.timeout = Duration::from_millis(ms);
            }
            _ => {
                log::warn!("usb: Unknown option: {}={}", key, value);
            }
        }
    }

    match (vid, pid) {
        (Some(vid), Some(pid)) => config.ids = vec![(vid, pid)],
        (None, None) => {}
        _ => return Err("vid and pid must be given together".to_string()),
    }
    Ok(config)
}

/// Bridge with control and data channels to the board matching `config`
pub fn usb_bridge(config: &UsbConfig) -> LinkBridge {
    let link = UsbLink::new(config.clone());
    let data = UsbDataChannel::new(link.interface());
    LinkBridge::with_data(ControlChannel::new(Box::new(link)), Arc::new(data))
}

/// Builds bridges for boards found on the bus
#[derive(Debug, Clone)]
pub struct UsbConnector {
    timeout: Duration,
}

impl UsbConnector {
    /// Connector using `timeout` for the control link
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn config_for(&self, descriptor: &BoardDescriptor) -> Option<UsbConfig> {
        match descriptor.id() {
            TransportId::Usb {
                bus_id,
                address,
                serial,
            } => Some(UsbConfig {
                ids: vec![(descriptor.vid(), descriptor.pid())],
                serial: serial.clone(),
                location: Some((bus_id.clone(), *address)),
                timeout: self.timeout,
            }),
            _ => None,
        }
    }
}

impl Default for UsbConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Connector for UsbConnector {
    fn connect(&self, descriptor: &BoardDescriptor) -> radarlink_core::Result<Arc<dyn Bridge>> {
        match self.config_for(descriptor) {
            Some(config) => Ok(Arc::new(usb_bridge(&config))),
            None => {
                log::error!("usb connector cannot reach {}", descriptor.id());
                Err(LinkError::Unavailable.into())
            }
        }
    }
}
