//! Board database for runtime loading and lookup
//!
//! Boards are described in RON files, one file per vendor:
//!
//! ```ron
//! (
//!     vendor: "Infineon",
//!     vid: 0x058B,
//!     boards: [
//!         (
//!             name: "RadarBaseboardMCU7",
//!             pid: 0x0251,
//!             transports: [Usb, Udp],
//!             components: [(kind: "radar-avian", count: 1)],
//!         ),
//!     ],
//! )
//! ```

use super::TransportFamily;
use crate::component::ComponentKind;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

const BUILTIN: &str = include_str!("../../boards/infineon.ron");

/// Error type for board database operations
#[derive(Debug, Error)]
pub enum BoardDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Semantic error in an otherwise well-formed file
    #[error("validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

#[derive(Debug, Clone, serde::Deserialize)]
struct ComponentDef {
    kind: String,
    #[serde(default = "default_count")]
    count: u8,
}

fn default_count() -> u8 {
    1
}

#[derive(Debug, Clone, serde::Deserialize)]
struct BoardDef {
    name: String,
    pid: u16,
    #[serde(default)]
    transports: Vec<TransportFamily>,
    #[serde(default)]
    components: Vec<ComponentDef>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    vendor: String,
    vid: u16,
    boards: Vec<BoardDef>,
}

// ============================================================================
// Board database
// ============================================================================

/// A known board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    /// Vendor name
    pub vendor: String,
    /// Board name
    pub name: String,
    /// Vendor id
    pub vid: u16,
    /// Product id
    pub pid: u16,
    /// Transports the board firmware speaks
    pub transports: Vec<TransportFamily>,
    /// Components fitted, with instance counts
    pub components: Vec<(ComponentKind, u8)>,
}

/// Runtime board database
#[derive(Debug, Clone, Default)]
pub struct BoardDatabase {
    boards: Vec<BoardEntry>,
}

impl BoardDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self { boards: Vec::new() }
    }

    /// Database with the boards shipped with this crate
    pub fn builtin() -> Self {
        let mut db = Self::new();
        if let Err(e) = db.load_ron(BUILTIN) {
            // covered by a unit test; only reachable if the file is edited
            log::error!("built-in board database is invalid: {}", e);
        }
        db
    }

    /// Load board definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, BoardDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load board definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, BoardDbError> {
        let vendor_def: VendorDef = ron::from_str(content)?;
        let mut entries = Vec::with_capacity(vendor_def.boards.len());

        for board in vendor_def.boards {
            let components = board
                .components
                .iter()
                .map(|c| {
                    ComponentKind::from_name(&c.kind)
                        .map(|kind| (kind, c.count))
                        .ok_or_else(|| {
                            BoardDbError::Validation(format!(
                                "{}: unknown component '{}'",
                                board.name, c.kind
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if self.find_by_id(vendor_def.vid, board.pid).is_some()
                || entries
                    .iter()
                    .any(|e: &BoardEntry| e.pid == board.pid)
            {
                return Err(BoardDbError::Validation(format!(
                    "{}: duplicate id {:04x}:{:04x}",
                    board.name, vendor_def.vid, board.pid
                )));
            }

            entries.push(BoardEntry {
                vendor: vendor_def.vendor.clone(),
                name: board.name,
                vid: vendor_def.vid,
                pid: board.pid,
                transports: board.transports,
                components,
            });
        }

        let count = entries.len();
        self.boards.extend(entries);
        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, BoardDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all boards in the database
    pub fn boards(&self) -> &[BoardEntry] {
        &self.boards
    }

    /// Get the number of boards in the database
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Find a board by its vendor and product id
    pub fn find_by_id(&self, vid: u16, pid: u16) -> Option<&BoardEntry> {
        self.boards.iter().find(|b| b.vid == vid && b.pid == pid)
    }

    /// Find boards by name (case-insensitive partial match)
    pub fn find_by_name(&self, name: &str) -> Vec<&BoardEntry> {
        let name_lower = name.to_lowercase();
        self.boards
            .iter()
            .filter(|b| b.name.to_lowercase().contains(&name_lower))
            .collect()
    }

    /// (vid, pid) pairs of boards reachable through `family`
    pub fn ids_for(&self, family: TransportFamily) -> Vec<(u16, u16)> {
        self.boards
            .iter()
            .filter(|b| b.transports.contains(&family))
            .map(|b| (b.vid, b.pid))
            .collect()
    }

    /// Iterate over all boards
    pub fn iter(&self) -> impl Iterator<Item = &BoardEntry> {
        self.boards.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_database_parses() {
        let mut db = BoardDatabase::new();
        let count = db.load_ron(BUILTIN).unwrap();
        assert!(count > 0);
        assert_eq!(BoardDatabase::builtin().len(), count);

        let mcu7 = db.find_by_id(0x058B, 0x0251).unwrap();
        assert_eq!(mcu7.name, "RadarBaseboardMCU7");
        assert!(mcu7
            .components
            .contains(&(ComponentKind::RadarAvian, 1)));
    }

    #[test]
    fn test_load_ron() {
        let ron = r#"
        (
            vendor: "Acme",
            vid: 0x1234,
            boards: [
                (name: "Acme Radar One", pid: 0x0001, transports: [Udp]),
                (
                    name: "Acme Radar Two",
                    pid: 0x0002,
                    transports: [Usb, Spi],
                    components: [(kind: "radar-ltr11"), (kind: "power-supply", count: 2)],
                ),
            ],
        )
        "#;

        let mut db = BoardDatabase::new();
        assert_eq!(db.load_ron(ron).unwrap(), 2);
        assert_eq!(db.ids_for(TransportFamily::Udp), vec![(0x1234, 0x0001)]);
        assert_eq!(db.ids_for(TransportFamily::Spi), vec![(0x1234, 0x0002)]);

        let two = db.find_by_name("two");
        assert_eq!(two.len(), 1);
        assert_eq!(
            two[0].components,
            vec![
                (ComponentKind::RadarLtr11, 1),
                (ComponentKind::PowerSupply, 2)
            ]
        );
    }

    #[test]
    fn test_unknown_component_rejected() {
        let ron = r#"(vendor: "X", vid: 1, boards: [(name: "B", pid: 2, components: [(kind: "flux-capacitor")])])"#;
        let err = BoardDatabase::new().load_ron(ron).unwrap_err();
        assert!(matches!(err, BoardDbError::Validation(msg) if msg.contains("flux-capacitor")));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let ron = r#"(vendor: "X", vid: 1, boards: [(name: "A", pid: 2), (name: "B", pid: 2)])"#;
        let mut db = BoardDatabase::new();
        assert!(matches!(
            db.load_ron(ron),
            Err(BoardDbError::Validation(_))
        ));
        assert!(db.is_empty());
    }
}
