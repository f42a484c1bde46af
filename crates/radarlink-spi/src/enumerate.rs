//! spidev node scan
//!
//! A spidev node cannot report what is attached without a transfer, so
//! nodes are described by the board database: when exactly one known
//! board speaks SPI, every node is reported as that board.

use crate::SpiConnector;
use radarlink_core::board::{
    BoardDatabase, BoardDescriptor, BoardFilter, Boards, Connector, Enumerator, TransportFamily,
    TransportId,
};
use radarlink_core::{LinkError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Enumerator listing `/dev/spidev*` nodes
pub struct SpiEnumerator {
    dev_dir: PathBuf,
    db: BoardDatabase,
    connector: Arc<SpiConnector>,
}

impl SpiEnumerator {
    /// Scan `/dev`, naming nodes from `db`
    pub fn new(db: BoardDatabase) -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            db,
            connector: Arc::new(SpiConnector::default()),
        }
    }

    /// Scan `dir` instead of `/dev`
    pub fn with_dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dir.into();
        self
    }

    /// Connector used by the reported descriptors
    pub fn with_connector(mut self, connector: SpiConnector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    fn nodes(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut nodes: Vec<PathBuf> = fs::read_dir(&self.dev_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_spidev(path))
            .collect();
        nodes.sort();
        Ok(nodes)
    }
}

fn is_spidev(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("spidev"))
}

impl Enumerator for SpiEnumerator {
    fn family(&self) -> TransportFamily {
        TransportFamily::Spi
    }

    fn enumerate(&self, filter: &BoardFilter) -> Result<Boards<'_>> {
        let nodes = self.nodes().map_err(|e| {
            log::warn!("cannot list {}: {}", self.dev_dir.display(), e);
            LinkError::Unavailable
        })?;

        let candidates: Vec<_> = self
            .db
            .iter()
            .filter(|b| b.transports.contains(&TransportFamily::Spi))
            .collect();
        let (vid, pid, board_name) = match candidates.as_slice() {
            [only] => (only.vid, only.pid, Some(only.name.clone())),
            _ => (0, 0, None),
        };

        let filter = filter.clone();
        let connector = self.connector.clone();
        Ok(Box::new(nodes.into_iter().filter_map(move |node| {
            let name = board_name.clone().unwrap_or_else(|| {
                node.file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
            });
            if !filter.matches(&name, vid, pid) {
                log::debug!("{} filtered out", node.display());
                return None;
            }
            log::info!("found {} at {}", name, node.display());
            let connector: Arc<dyn Connector> = connector.clone();
            Some(BoardDescriptor::new(
                name,
                vid,
                pid,
                TransportId::Path(node),
                connector,
            ))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_dev_dir(nodes: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for node in nodes {
            fs::write(dir.path().join(node), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_lists_spidev_nodes_in_order() {
        let tmp = fake_dev_dir(&["spidev1.0", "ttyS0", "spidev0.1", "spidev0.0"]);
        let dir = tmp.path();
        let enumerator = SpiEnumerator::new(BoardDatabase::builtin()).with_dev_dir(dir);

        let found: Vec<_> = enumerator.enumerate(&BoardFilter::any()).unwrap().collect();
        let paths: Vec<_> = found.iter().map(|d| d.id().clone()).collect();
        assert_eq!(
            paths,
            vec![
                TransportId::Path(dir.join("spidev0.0")),
                TransportId::Path(dir.join("spidev0.1")),
                TransportId::Path(dir.join("spidev1.0")),
            ]
        );
        // the built-in database knows one SPI board
        assert_eq!(found[0].name(), "RadarBaseboardAtr22");
        assert_eq!(found[0].pid(), 0x0256);

        let filtered = enumerator
            .enumerate(&BoardFilter::any().with_ids([(0x058B, 0x0251)]))
            .unwrap()
            .count();
        assert_eq!(filtered, 0);
    }

    #[test]
    fn test_unknown_boards_named_by_node() {
        let tmp = fake_dev_dir(&["spidev2.1"]);
        let enumerator = SpiEnumerator::new(BoardDatabase::new()).with_dev_dir(tmp.path());
        let found: Vec<_> = enumerator.enumerate(&BoardFilter::any()).unwrap().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "spidev2.1");
        assert_eq!((found[0].vid(), found[0].pid()), (0, 0));
    }

    #[test]
    fn test_missing_dev_dir() {
        let enumerator =
            SpiEnumerator::new(BoardDatabase::new()).with_dev_dir("/nonexistent/radarlink");
        assert!(enumerator.enumerate(&BoardFilter::any()).is_err());
    }
}
