//! Board discovery
//!
//! Enumerators scan one transport family and yield [`BoardDescriptor`]s
//! without opening anything. A descriptor knows how to build the bridge
//! for its board; connecting is a separate step.

mod database;

pub use database::{BoardDatabase, BoardDbError, BoardEntry};

use crate::bridge::Bridge;
use crate::error::Result;
use core::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Transport families a board can be reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub enum TransportFamily {
    /// USB bulk endpoints
    Usb,
    /// Ethernet, UDP control port
    Udp,
    /// Linux spidev
    Spi,
    /// In-memory test device
    Mock,
}

impl TransportFamily {
    /// Lowercase name as used in board strings
    pub fn name(self) -> &'static str {
        match self {
            TransportFamily::Usb => "usb",
            TransportFamily::Udp => "udp",
            TransportFamily::Spi => "spi",
            TransportFamily::Mock => "mock",
        }
    }
}

/// Transport-specific board identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportId {
    /// Control socket address of an Ethernet board
    Udp(SocketAddr),
    /// Position on a USB bus
    Usb {
        /// Bus identifier as reported by the OS
        bus_id: String,
        /// Device address on the bus
        address: u8,
        /// Serial number string, if readable without opening
        serial: Option<String>,
    },
    /// Device node (SPI)
    Path(PathBuf),
    /// Name of an in-memory device
    Mock(String),
}

impl TransportId {
    /// Family this identity belongs to
    pub fn family(&self) -> TransportFamily {
        match self {
            TransportId::Udp(_) => TransportFamily::Udp,
            TransportId::Usb { .. } => TransportFamily::Usb,
            TransportId::Path(_) => TransportFamily::Spi,
            TransportId::Mock(_) => TransportFamily::Mock,
        }
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportId::Udp(addr) => write!(f, "udp {}", addr),
            TransportId::Usb {
                bus_id,
                address,
                serial,
            } => {
                write!(f, "usb {}:{}", bus_id, address)?;
                if let Some(serial) = serial {
                    write!(f, " serial {}", serial)?;
                }
                Ok(())
            }
            TransportId::Path(path) => write!(f, "spi {}", path.display()),
            TransportId::Mock(name) => write!(f, "mock {}", name),
        }
    }
}

/// Builds the bridge for a descriptor
pub trait Connector: Send + Sync {
    /// Create (but do not open) the bridge for `descriptor`
    fn connect(&self, descriptor: &BoardDescriptor) -> Result<Arc<dyn Bridge>>;
}

/// A discovered board
#[derive(Clone)]
pub struct BoardDescriptor {
    name: String,
    vid: u16,
    pid: u16,
    id: TransportId,
    connector: Arc<dyn Connector>,
}

impl BoardDescriptor {
    /// Describe a board reachable through `connector`
    pub fn new(
        name: impl Into<String>,
        vid: u16,
        pid: u16,
        id: TransportId,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            name: name.into(),
            vid,
            pid,
            id,
            connector,
        }
    }

    /// Board name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vendor id
    pub fn vid(&self) -> u16 {
        self.vid
    }

    /// Product id
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Transport identity
    pub fn id(&self) -> &TransportId {
        &self.id
    }

    /// Build the bridge for this board. The bridge is not opened.
    pub fn create_bridge(&self) -> Result<Arc<dyn Bridge>> {
        self.connector.connect(self)
    }
}

impl fmt::Debug for BoardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardDescriptor")
            .field("name", &self.name)
            .field("vid", &format_args!("{:#06x}", self.vid))
            .field("pid", &format_args!("{:#06x}", self.pid))
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for BoardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:04x}:{:04x}] ({})",
            self.name, self.vid, self.pid, self.id
        )
    }
}

/// Which boards an enumeration reports
#[derive(Debug, Clone, Default)]
pub struct BoardFilter {
    ids: Vec<(u16, u16)>,
    name: Option<String>,
}

impl BoardFilter {
    /// Accept every board
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept only these (vid, pid) pairs
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = (u16, u16)>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Accept only boards whose name contains `name` (case-insensitive)
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_lowercase());
        self
    }

    /// Whether a board passes the filter
    pub fn matches(&self, name: &str, vid: u16, pid: u16) -> bool {
        let id_ok = self.ids.is_empty() || self.ids.contains(&(vid, pid));
        let name_ok = self
            .name
            .as_ref()
            .map_or(true, |wanted| name.to_lowercase().contains(wanted));
        id_ok && name_ok
    }
}

/// Lazy sequence of discovered boards
pub type Boards<'a> = Box<dyn Iterator<Item = BoardDescriptor> + 'a>;

/// Scans one transport family for boards
///
/// Every call starts a fresh scan; the returned sequence is finite and is
/// not restartable.
pub trait Enumerator {
    /// Family this enumerator scans
    fn family(&self) -> TransportFamily;

    /// Start a scan
    fn enumerate(&self, filter: &BoardFilter) -> Result<Boards<'_>>;
}
