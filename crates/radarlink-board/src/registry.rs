//! Transport registry and board selection
//!
//! Boards are selected with strings of the form `family` or
//! `family:key1=value1,key2=value2`. This module parses them, builds the
//! bridge of the matching transport crate and wraps it in a
//! [`BoardHandle`]. Transports are compiled in through cargo features.

use crate::handle::BoardHandle;
use radarlink_core::board::{BoardDatabase, BoardDescriptor, BoardFilter, Enumerator, TransportFamily};
#[allow(unused_imports)] // Used in feature-gated code
use radarlink_core::bridge::Bridge;
use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
#[allow(unused_imports)] // Used in feature-gated code
use std::sync::Arc;
use std::time::Duration;

/// Information about a compiled-in transport
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Family served by the transport
    pub family: TransportFamily,
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all transports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "mock")]
    transports.push(TransportInfo {
        family: TransportFamily::Mock,
        name: "mock",
        aliases: &[],
        description: "In-memory emulated radar board for testing",
    });

    #[cfg(feature = "udp")]
    transports.push(TransportInfo {
        family: TransportFamily::Udp,
        name: "udp",
        aliases: &["ethernet"],
        description: "Ethernet boards over UDP (ip=<address>,port=<n>,dataport=<n>)",
    });

    #[cfg(feature = "usb")]
    transports.push(TransportInfo {
        family: TransportFamily::Usb,
        name: "usb",
        aliases: &[],
        description: "USB boards over bulk endpoints (vid=<id>,pid=<id>,serial=<s>)",
    });

    #[cfg(feature = "spi")]
    transports.push(TransportInfo {
        family: TransportFamily::Spi,
        name: "spi",
        aliases: &["spidev"],
        description: "Boards on a Linux spidev node (dev=/dev/spidevX.Y,spispeed=<kHz>)",
    });

    transports
}

/// Generate a short list of transport names for CLI help
pub fn transport_names_short() -> String {
    let transports = available_transports();
    if transports.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = transports.iter().map(|t| t.name).collect();
    names.join(", ")
}

/// Look up a compiled-in transport by name or alias
pub fn find_transport(name: &str) -> Option<TransportInfo> {
    available_transports()
        .into_iter()
        .find(|t| t.name == name || t.aliases.contains(&name))
}

/// Parsed board selection
#[derive(Debug, Clone)]
pub struct BoardParams {
    /// Transport family
    pub family: TransportFamily,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl BoardParams {
    /// Parameters as the `(key, value)` list the transport parsers take
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a board string into family and parameters
///
/// Format: "family" or "family:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_board_params("udp:ip=169.254.1.101")?;
/// assert_eq!(params.family, TransportFamily::Udp);
/// assert_eq!(params.params.get("ip"), Some(&"169.254.1.101".to_string()));
/// ```
pub fn parse_board_params(s: &str) -> Result<BoardParams, Box<dyn Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let transport = find_transport(name).ok_or_else(|| {
        format!(
            "Unknown transport: {} (available: {})",
            name,
            transport_names_short()
        )
    })?;

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(BoardParams {
        family: transport.family,
        params,
    })
}

/// Open a board and create a BoardHandle
///
/// This is the main entry point for the CLI. It handles:
/// 1. Parsing the board string
/// 2. Building the bridge of the selected transport
/// 3. Opening it and identifying the board
///
/// # Example
/// ```ignore
/// let db = BoardDatabase::builtin();
/// let handle = open_board("udp:ip=169.254.1.101", &db)?;
/// println!("{}", handle.name());
/// ```
pub fn open_board(board: &str, db: &BoardDatabase) -> Result<BoardHandle, Box<dyn Error>> {
    let params = parse_board_params(board)?;

    match params.family {
        #[cfg(feature = "mock")]
        TransportFamily::Mock => open_mock(&params, db),

        #[cfg(feature = "udp")]
        TransportFamily::Udp => open_udp(&params, db),

        #[cfg(feature = "usb")]
        TransportFamily::Usb => open_usb(&params, db),

        #[cfg(feature = "spi")]
        TransportFamily::Spi => open_spi(&params, db),

        #[allow(unreachable_patterns)]
        other => Err(format!("Transport {} not compiled in", other.name()).into()),
    }
}

/// Connect to a board found by [`enumerate`]
pub fn open_descriptor(
    descriptor: &BoardDescriptor,
    db: &BoardDatabase,
) -> Result<BoardHandle, Box<dyn Error>> {
    log::info!("Opening {}...", descriptor);
    let bridge = descriptor.create_bridge()?;
    Ok(BoardHandle::connect(bridge, db)?)
}

// Transport-specific open functions

#[cfg(feature = "mock")]
fn open_mock(params: &BoardParams, db: &BoardDatabase) -> Result<BoardHandle, Box<dyn Error>> {
    use radarlink_mock::{mock_bridge, shared, MockBoard};

    for (key, value) in &params.params {
        log::warn!("mock: Unknown option: {}={}", key, value);
    }
    log::info!("Opening emulated board...");
    let board = shared(MockBoard::new_default());
    Ok(BoardHandle::connect(Arc::new(mock_bridge(&board)), db)?)
}

#[cfg(feature = "udp")]
fn open_udp(params: &BoardParams, db: &BoardDatabase) -> Result<BoardHandle, Box<dyn Error>> {
    use radarlink_udp::{parse_options, udp_bridge};

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid udp parameters: {}", e))?;
    log::info!("Opening Ethernet board at {}...", config.control_address());
    let bridge: Arc<dyn Bridge> = Arc::new(udp_bridge(&config));
    BoardHandle::connect(bridge, db).map_err(|e| {
        format!(
            "Failed to reach board at {}: {}\nCheck the address and that the board is powered.",
            config.control_address(),
            e
        )
        .into()
    })
}

#[cfg(feature = "usb")]
fn open_usb(params: &BoardParams, db: &BoardDatabase) -> Result<BoardHandle, Box<dyn Error>> {
    use radarlink_usb::{parse_options, usb_bridge};

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid usb parameters: {}", e))?;
    log::info!("Opening USB board ({})...", config);
    let bridge: Arc<dyn Bridge> = Arc::new(usb_bridge(&config));
    BoardHandle::connect(bridge, db).map_err(|e| {
        format!(
            "Failed to open USB board: {}\n\
             Make sure the board is connected and you have permissions.",
            e
        )
        .into()
    })
}

#[cfg(feature = "spi")]
fn open_spi(params: &BoardParams, db: &BoardDatabase) -> Result<BoardHandle, Box<dyn Error>> {
    use radarlink_spi::{parse_options, spi_bridge};

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid spi parameters: {}", e))?;
    log::info!("Opening board on {}...", config.device.display());
    let bridge: Arc<dyn Bridge> = Arc::new(spi_bridge(&config));
    BoardHandle::connect(bridge, db).map_err(|e| {
        format!(
            "Failed to open SPI board: {}\n\
             Make sure the device exists and you have read/write permissions.\n\
             You may need to: sudo usermod -aG spi $USER",
            e
        )
        .into()
    })
}

/// Settings for [`enumerate`]
#[derive(Debug, Clone, Default)]
pub struct EnumerateOptions {
    /// UDP discovery targets; the link-local defaults when empty
    pub targets: Vec<SocketAddr>,
    /// How long to collect UDP answers
    pub window: Option<Duration>,
}

/// Build the enumerator for `family`
#[allow(unused_variables)]
pub fn enumerator(
    family: TransportFamily,
    db: &BoardDatabase,
    options: &EnumerateOptions,
) -> Result<Box<dyn Enumerator>, Box<dyn Error>> {
    match family {
        #[cfg(feature = "mock")]
        TransportFamily::Mock => Ok(Box::new(radarlink_mock::MockEnumerator::new_default())),

        #[cfg(feature = "udp")]
        TransportFamily::Udp => {
            let mut enumerator = radarlink_udp::UdpEnumerator::new(db.clone());
            if !options.targets.is_empty() {
                enumerator = enumerator.with_targets(options.targets.iter().copied());
            }
            if let Some(window) = options.window {
                enumerator = enumerator.with_window(window);
            }
            Ok(Box::new(enumerator))
        }

        #[cfg(feature = "usb")]
        TransportFamily::Usb => Ok(Box::new(radarlink_usb::UsbEnumerator::new(db.clone()))),

        #[cfg(feature = "spi")]
        TransportFamily::Spi => Ok(Box::new(radarlink_spi::SpiEnumerator::new(db.clone()))),

        #[allow(unreachable_patterns)]
        other => Err(format!("Transport {} not compiled in", other.name()).into()),
    }
}

/// Scan one transport family for boards
pub fn enumerate(
    family: TransportFamily,
    filter: &BoardFilter,
    db: &BoardDatabase,
    options: &EnumerateOptions,
) -> Result<Vec<BoardDescriptor>, Box<dyn Error>> {
    let enumerator = enumerator(family, db, options)?;
    let boards: Vec<_> = enumerator.enumerate(filter)?.collect();
    log::info!("Found {} {} board(s)", boards.len(), family.name());
    Ok(boards)
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use radarlink_core::component::{ComponentAccess, ComponentKind};

    #[test]
    fn test_parse_board_params() {
        let params = parse_board_params("mock").unwrap();
        assert_eq!(params.family, TransportFamily::Mock);
        assert!(params.params.is_empty());

        assert!(parse_board_params("nonsense:a=b").is_err());
        assert!(parse_board_params("mock:novalue").is_err());
    }

    #[cfg(feature = "udp")]
    #[test]
    fn test_parse_aliases_and_options() {
        let params = parse_board_params("ethernet:ip=169.254.1.101,timeout=500").unwrap();
        assert_eq!(params.family, TransportFamily::Udp);
        assert_eq!(params.params.get("ip").map(String::as_str), Some("169.254.1.101"));
        let mut options = params.options();
        options.sort();
        assert_eq!(options, vec![("ip", "169.254.1.101"), ("timeout", "500")]);
    }

    #[test]
    fn test_available_transports() {
        let transports = available_transports();
        assert!(transports.iter().any(|t| t.family == TransportFamily::Mock));
        assert!(transport_names_short().contains("mock"));
        assert!(find_transport("mock").is_some());
        assert!(find_transport("serial").is_none());
    }

    #[test]
    fn test_open_mock_board() {
        let db = BoardDatabase::builtin();
        let handle = open_board("mock", &db).unwrap();
        assert_eq!(handle.name(), "RadarBaseboardMCU7");
        let radar = handle.component(ComponentKind::RadarAvian, 0).unwrap();
        radar.registers().unwrap().write(0x01, 7).unwrap();
        assert_eq!(radar.registers().unwrap().read(0x01).unwrap(), 7);
    }

    #[test]
    fn test_enumerate_and_open_descriptor() {
        let db = BoardDatabase::builtin();
        let found = enumerate(
            TransportFamily::Mock,
            &BoardFilter::any(),
            &db,
            &EnumerateOptions::default(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        let handle = open_descriptor(&found[0], &db).unwrap();
        assert_eq!(handle.info().vid, 0x058B);

        let none = enumerate(
            TransportFamily::Mock,
            &BoardFilter::any().with_name("aurix"),
            &db,
            &EnumerateOptions::default(),
        )
        .unwrap();
        assert!(none.is_empty());
    }
}
