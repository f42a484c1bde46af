//! USB bus scan for known boards

use crate::UsbConnector;
use nusb::MaybeFuture;
use radarlink_core::board::{
    BoardDatabase, BoardDescriptor, BoardFilter, Boards, Connector, Enumerator, TransportFamily,
    TransportId,
};
use radarlink_core::{LinkError, Result};
use std::sync::Arc;

/// Enumerator listing USB devices whose ids are in the board database
pub struct UsbEnumerator {
    db: BoardDatabase,
    connector: Arc<UsbConnector>,
}

impl UsbEnumerator {
    /// Scan for the USB boards known to `db`
    pub fn new(db: BoardDatabase) -> Self {
        Self {
            db,
            connector: Arc::new(UsbConnector::default()),
        }
    }

    /// Connector used by the reported descriptors
    pub fn with_connector(mut self, connector: UsbConnector) -> Self {
        self.connector = Arc::new(connector);
        self
    }
}

impl Enumerator for UsbEnumerator {
    fn family(&self) -> TransportFamily {
        TransportFamily::Usb
    }

    fn enumerate(&self, filter: &BoardFilter) -> Result<Boards<'_>> {
        let known = self.db.ids_for(TransportFamily::Usb);
        let devices = nusb::list_devices().wait().map_err(|e| {
            log::warn!("cannot list USB devices: {}", e);
            LinkError::Unavailable
        })?;
        let filter = filter.clone();
        let connector = self.connector.clone();

        Ok(Box::new(devices.filter_map(move |d| {
            let ids = (d.vendor_id(), d.product_id());
            if !known.contains(&ids) {
                return None;
            }
            let name = self.db.find_by_id(ids.0, ids.1)?.name.clone();
            if !filter.matches(&name, ids.0, ids.1) {
                log::debug!("{} on bus {} filtered out", name, d.bus_id());
                return None;
            }
            let id = TransportId::Usb {
                bus_id: d.bus_id().to_string(),
                address: d.device_address(),
                serial: d.serial_number().map(String::from),
            };
            log::info!("found {} [{:04x}:{:04x}] at {}", name, ids.0, ids.1, id);
            let connector: Arc<dyn Connector> = connector.clone();
            Some(BoardDescriptor::new(name, ids.0, ids.1, id, connector))
        })))
    }
}
