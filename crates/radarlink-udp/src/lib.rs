//! radarlink-udp - Ethernet transport for radar boards
//!
//! Ethernet boards expose a UDP control port (vendor commands, one
//! transfer per datagram) and a data port streaming frames. This crate
//! provides the control [`UdpLink`], the [`UdpDataChannel`], the bridge
//! combining both, and the broadcast discovery [`UdpEnumerator`].
//!
//! # Board options
//!
//! - `ip=<address>`: board address (required)
//! - `port=<n>`: control port, default 55055
//! - `dataport=<n>`: data port, default control port + 1
//! - `timeout=<ms>`: control receive timeout, default 1000

mod data;
mod enumerate;
mod link;

pub use data::{UdpDataChannel, UdpFrameSource, FRAME_HEADER_LEN};
pub use enumerate::{UdpEnumerator, DEFAULT_TARGETS, DEFAULT_WINDOW};
pub use link::{UdpLink, MAX_TRANSFER};

use radarlink_core::board::{BoardDescriptor, Connector, TransportId};
use radarlink_core::bridge::{Bridge, ControlChannel, LinkBridge};
use radarlink_core::{LinkError, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Default control port of Ethernet boards
pub const DEFAULT_PORT: u16 = 55055;

/// Default control receive timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Connection settings for one Ethernet board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Board address
    pub ip: IpAddr,
    /// Control port
    pub port: u16,
    /// Data port
    pub data_port: u16,
    /// Control receive timeout
    pub timeout: Duration,
}

impl UdpConfig {
    /// Settings for the board whose control port is `address`
    ///
    /// The data port is the next port up, so control port 65535 is refused.
    pub fn new(address: SocketAddr) -> std::result::Result<Self, String> {
        Ok(Self {
            ip: address.ip(),
            port: address.port(),
            data_port: default_data_port(address.port())?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Control socket address
    pub fn control_address(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Data socket address
    pub fn data_address(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.data_port)
    }
}

fn default_data_port(port: u16) -> std::result::Result<u16, String> {
    port.checked_add(1).ok_or_else(|| {
        format!(
            "Control port {} leaves no room for the data port. Use dataport=<n>",
            port
        )
    })
}

/// Parse `key=value` board options into a [`UdpConfig`]
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<UdpConfig, String> {
    let mut ip = None;
    let mut port = DEFAULT_PORT;
    let mut data_port = None;
    let mut timeout = DEFAULT_TIMEOUT;

    for (key, value) in options {
        match *key {
            "ip" => {
                ip = Some(
                    value
                        .parse::<IpAddr>()
                        .map_err(|_| format!("Invalid ip value: {}", value))?,
                );
            }
            "port" => {
                port = value
                    .parse()
                    .map_err(|_| format!("Invalid port value: {}", value))?;
            }
            "dataport" => {
                data_port = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid dataport value: {}", value))?,
                );
            }
            "timeout" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                if ms == 0 {
                    return Err("timeout must be at least 1 ms".to_string());
                }
                timeout = Duration::from_millis(ms);
            }
            _ => {
                log::warn!("udp: Unknown option: {}={}", key, value);
            }
        }
    }

    let ip = ip.ok_or_else(|| "No board address specified. Use ip=<address>".to_string())?;
    let data_port = match data_port {
        Some(data_port) => data_port,
        None => default_data_port(port)?,
    };
    Ok(UdpConfig {
        ip,
        port,
        data_port,
        timeout,
    })
}

/// Bridge with control and data channels to the board at `config`
pub fn udp_bridge(config: &UdpConfig) -> LinkBridge {
    log::debug!("udp bridge to {}", config.control_address());
    LinkBridge::with_data(
        ControlChannel::new(Box::new(UdpLink::new(config.clone()))),
        Arc::new(UdpDataChannel::new(config.data_address())),
    )
}

/// Builds bridges for discovered Ethernet boards
#[derive(Debug, Clone)]
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    /// Connector using `timeout` for the control link
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Connector for UdpConnector {
    fn connect(&self, descriptor: &BoardDescriptor) -> Result<Arc<dyn Bridge>> {
        match descriptor.id() {
            TransportId::Udp(address) => {
                let config = UdpConfig::new(*address).map_err(|e| {
                    log::error!("udp connector: {}", e);
                    LinkError::Unavailable
                })?;
                let config = UdpConfig {
                    timeout: self.timeout,
                    ..config
                };
                Ok(Arc::new(udp_bridge(&config)))
            }
            other => {
                log::error!("udp connector cannot reach {}", other);
                Err(LinkError::Unavailable.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarlink_core::component::{Component, ComponentAccess, ComponentKind};
    use radarlink_core::bridge::ProtocolBridge;
    use radarlink_mock::{shared, MockBoard, MockUdpBoard};

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("ip", "169.254.1.101"), ("timeout", "500")]).unwrap();
        assert_eq!(config.control_address(), "169.254.1.101:55055".parse().unwrap());
        assert_eq!(config.data_address().port(), 55056);
        assert_eq!(config.timeout, Duration::from_millis(500));

        let config = parse_options(&[("ip", "10.0.0.2"), ("port", "6000"), ("dataport", "7000")]).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.data_port, 7000);
    }

    #[test]
    fn test_parse_options_errors() {
        assert!(parse_options(&[]).is_err());
        assert!(parse_options(&[("ip", "not-an-ip")]).is_err());
        assert!(parse_options(&[("ip", "10.0.0.2"), ("port", "70000")]).is_err());
        assert!(parse_options(&[("ip", "10.0.0.2"), ("timeout", "0")]).is_err());
    }

    #[test]
    fn test_top_port_needs_explicit_data_port() {
        assert!(parse_options(&[("ip", "10.0.0.2"), ("port", "65535")]).is_err());
        let config =
            parse_options(&[("ip", "10.0.0.2"), ("port", "65535"), ("dataport", "65534")]).unwrap();
        assert_eq!(config.data_address().port(), 65534);

        assert!(UdpConfig::new("10.0.0.2:65535".parse().unwrap()).is_err());
        assert_eq!(
            UdpConfig::new("10.0.0.2:65534".parse().unwrap()).unwrap().data_port,
            65535
        );

        let descriptor = BoardDescriptor::new(
            "x",
            0,
            0,
            TransportId::Udp("10.0.0.2:65535".parse().unwrap()),
            Arc::new(UdpConnector::default()),
        );
        assert!(descriptor.create_bridge().is_err());
    }

    #[test]
    fn test_commands_over_udp() {
        let board = shared(MockBoard::new_default());
        let served = MockUdpBoard::spawn(board.clone()).unwrap();
        let bridge = ProtocolBridge::new(udp_bridge(&UdpConfig::new(served.address()).unwrap()));
        bridge.open().unwrap();

        assert_eq!(bridge.board_info().unwrap().name, "RadarBaseboardMCU7");

        let radar = Component::new(bridge.control().unwrap(), ComponentKind::RadarAvian, 0);
        let registers = radar.registers().unwrap();
        let values: Vec<u32> = (0..500).collect();
        registers.write_burst(0x00, &values[..100]).unwrap();
        let mut back = vec![0u32; 100];
        registers.read_burst(0x00, &mut back).unwrap();
        assert_eq!(back, values[..100]);

        // one datagram carries far more than the mock's own link would
        assert!(board.lock().transfers().iter().any(|t| t.len() > 64));
        bridge.close();
    }

    #[test]
    fn test_connector_rejects_foreign_ids() {
        let descriptor = BoardDescriptor::new(
            "x",
            0,
            0,
            TransportId::Mock("m".into()),
            Arc::new(UdpConnector::default()),
        );
        assert!(descriptor.create_bridge().is_err());
    }
}
