//! radarlink-spi - Linux spidev transport
//!
//! Boards wired to an SPI controller are reached through the
//! `/dev/spidevX.Y` character devices. The link carries control traffic
//! only; SPI bridges have no data channel.
//!
//! # Board options
//!
//! - `dev=/dev/spidevX.Y`: device node (required)
//! - `spispeed=<kHz>`: clock speed, default 10000
//! - `mode=<0-3>`: SPI mode, default 0
//! - `bufsiz=<bytes>`: largest transfer, default from the spidev module
//! - `timeout=<ms>`: response timeout, default 1000
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y`

pub mod device;
mod enumerate;
pub mod error;

pub use device::{mode, parse_options, SpiConfig, SpiLink, DEFAULT_BUFSIZ, DEFAULT_SPEED_HZ};
pub use enumerate::SpiEnumerator;
pub use error::{Result, SpiError};

use radarlink_core::board::{BoardDescriptor, Connector, TransportId};
use radarlink_core::bridge::{Bridge, ControlChannel, LinkBridge};
use radarlink_core::LinkError;
use std::sync::Arc;

/// Control-only bridge over the spidev node in `config`
pub fn spi_bridge(config: &SpiConfig) -> LinkBridge {
    LinkBridge::control_only(ControlChannel::new(Box::new(SpiLink::new(config.clone()))))
}

/// Builds bridges for spidev nodes
#[derive(Debug, Clone, Default)]
pub struct SpiConnector {
    speed_hz: Option<u32>,
    mode: Option<u8>,
}

impl SpiConnector {
    /// Connector opening nodes at `speed_hz` in `mode`
    pub fn new(speed_hz: u32, mode: u8) -> Self {
        Self {
            speed_hz: Some(speed_hz),
            mode: Some(mode),
        }
    }
}

impl Connector for SpiConnector {
    fn connect(&self, descriptor: &BoardDescriptor) -> radarlink_core::Result<Arc<dyn Bridge>> {
        match descriptor.id() {
            TransportId::Path(node) => {
                let mut config = SpiConfig::new(node.clone());
                if let Some(speed) = self.speed_hz {
                    config = config.with_speed(speed);
                }
                if let Some(mode) = self.mode {
                    config = config.with_mode(mode);
                }
                Ok(Arc::new(spi_bridge(&config)))
            }
            other => {
                log::error!("spi connector cannot reach {}", other);
                Err(LinkError::Unavailable.into())
            }
        }
    }
}
