//! BoardHandle - an open board with its identity and components
//!
//! The handle owns the bridge for one board. It queries the board
//! identity on connect, looks the board up in the database to learn which
//! components are fitted, and hands out component proxies and frame
//! streams. Dropping the handle closes the bridge.

use radarlink_core::board::{BoardDatabase, BoardEntry};
use radarlink_core::bridge::{BoardInfo, Bridge, ProtocolBridge, VersionInfo};
use radarlink_core::component::{Component, ComponentKind, RadarComponent};
use radarlink_core::frame::{StreamConfig, StreamReceiver};
use radarlink_core::{LinkError, Result};
use std::sync::Arc;

/// Open connection to one board
pub struct BoardHandle {
    bridge: ProtocolBridge<Arc<dyn Bridge>>,
    info: BoardInfo,
    entry: Option<BoardEntry>,
}

impl BoardHandle {
    /// Open `bridge` and identify the board behind it
    ///
    /// The bridge is closed again if the board does not answer.
    pub fn connect(bridge: Arc<dyn Bridge>, db: &BoardDatabase) -> Result<Self> {
        let bridge = ProtocolBridge::new(bridge);
        bridge.open()?;
        let info = match bridge.board_info() {
            Ok(info) => info,
            Err(e) => {
                bridge.close();
                return Err(e);
            }
        };
        let entry = db.find_by_id(info.vid, info.pid).cloned();
        match &entry {
            Some(entry) => log::info!("Connected to {} via {}", entry.name, bridge.name()),
            None => log::warn!(
                "Board {:04x}:{:04x} ({}) is not in the database",
                info.vid,
                info.pid,
                info.name
            ),
        }
        Ok(Self {
            bridge,
            info,
            entry,
        })
    }

    /// Identity reported by the board
    pub fn info(&self) -> &BoardInfo {
        &self.info
    }

    /// Board name, preferring the database entry
    pub fn name(&self) -> &str {
        self.entry
            .as_ref()
            .map_or(self.info.name.as_str(), |e| e.name.as_str())
    }

    /// Database entry, if the board is known
    pub fn entry(&self) -> Option<&BoardEntry> {
        self.entry.as_ref()
    }

    /// Bridge with the board-level queries
    pub fn bridge(&self) -> &ProtocolBridge<Arc<dyn Bridge>> {
        &self.bridge
    }

    /// Firmware version
    pub fn version(&self) -> Result<VersionInfo> {
        self.bridge.version_info()
    }

    /// Components fitted to the board with their instance counts
    pub fn components(&self) -> &[(ComponentKind, u8)] {
        self.entry.as_ref().map_or(&[][..], |e| e.components.as_slice())
    }

    /// Proxy for instance `id` of `kind`
    ///
    /// The proxy is built even for components the database does not list;
    /// the board answers commands to missing instances with an error.
    pub fn component(&self, kind: ComponentKind, id: u8) -> Result<Component> {
        let control = self.bridge.control().ok_or(LinkError::Unavailable)?;
        Ok(Component::new(control, kind, id))
    }

    /// The first radar front end listed for the board
    pub fn radar(&self) -> Option<RadarComponent> {
        let control = self.bridge.control()?;
        self.components()
            .iter()
            .find_map(|&(kind, _)| RadarComponent::new(control.clone(), kind, 0))
    }

    /// Start streaming frames from the data channel
    pub fn start_stream(&self, config: &StreamConfig) -> Result<StreamReceiver> {
        let data = self.bridge.data().ok_or_else(|| {
            log::error!("{} has no data channel", self.bridge.name());
            LinkError::Unavailable
        })?;
        let source = data.open_source(config.frame_size)?;
        log::info!(
            "Streaming {} byte frames into a pool of {}",
            config.frame_size,
            config.frame_count
        );
        StreamReceiver::start(source, config)
    }

    /// Close the bridge; also done on drop
    pub fn close(&self) {
        if self.bridge.is_connected() {
            log::debug!("Closing {}", self.bridge.name());
        }
        self.bridge.close();
    }
}

impl Drop for BoardHandle {
    fn drop(&mut self) {
        self.close();
    }
}
