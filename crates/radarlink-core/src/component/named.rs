//! Registers addressed by name
//!
//! A [`RegisterMap`] names the registers of a component and the bit fields
//! inside them. It is loaded from RON:
//!
//! ```ron
//! (
//!     registers: [
//!         (
//!             name: "MAIN",
//!             address: 0x00,
//!             reset: 0x1C8270,
//!             fields: [
//!                 (name: "FRAME_START", offset: 0, width: 1),
//!                 (name: "LOAD_STRL_PERIODS", offset: 12, width: 4),
//!             ],
//!         ),
//!     ],
//! )
//! ```
//!
//! [`NamedRegisters`] accepts `REGISTER`, `REGISTER.FIELD` or a plain
//! number (`0x1f`, `31`) wherever the [`Registers`] proxy takes an
//! address. Field writes become one device-side modify, so the other bits
//! of the register keep their value.

use super::Registers;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Fields whose name starts with this are not exposed
const RESERVED_PREFIX: &str = "RSVD";

#[derive(Debug, Error)]
pub enum NamedError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown register {0}")]
    UnknownRegister(String),
    #[error("register {register} has no field {field}")]
    UnknownField { register: String, field: String },
    /// Bursts and batch reads address whole registers only
    #[error("{0} is a bit field")]
    FieldAccess(String),
    #[error("value {value:#x} does not fit {name}")]
    ValueTooWide { name: String, value: u32 },
    #[error("config line {line}: {reason}")]
    Config { line: usize, reason: &'static str },
    #[error(transparent)]
    Device(#[from] crate::error::Error),
}

pub type NamedResult<T> = std::result::Result<T, NamedError>;

// ============================================================================
// RON deserialization types
// ============================================================================

#[derive(Debug, Clone, serde::Deserialize)]
struct FieldDef {
    name: String,
    offset: u8,
    width: u8,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RegisterDef {
    name: String,
    address: u32,
    #[serde(default)]
    reset: u32,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct MapDef {
    registers: Vec<RegisterDef>,
}

// ============================================================================
// Register map
// ============================================================================

/// Bits of one register holding a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Mask in register position
    pub mask: u32,
    /// Position of the lowest bit
    pub offset: u8,
}

impl BitField {
    /// Field of `width` bits at `offset`, if it fits a 32-bit register
    pub fn new(offset: u8, width: u8) -> Option<Self> {
        if width == 0 || u32::from(offset) + u32::from(width) > 32 {
            return None;
        }
        let ones = ((1u64 << width) - 1) as u32;
        Some(Self {
            mask: ones << offset,
            offset,
        })
    }

    /// Largest value the field holds
    pub fn max_value(&self) -> u32 {
        self.mask >> self.offset
    }

    /// Field value from a whole register value
    pub fn extract(&self, register: u32) -> u32 {
        (register & self.mask) >> self.offset
    }

    /// Field value moved into register position
    pub fn place(&self, value: u32) -> u32 {
        (value << self.offset) & self.mask
    }
}

/// One named register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRegister {
    pub address: u32,
    /// Value after reset
    pub reset: u32,
    pub fields: BTreeMap<String, BitField>,
}

/// Register names and bit fields of one component type
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    registers: BTreeMap<String, NamedRegister>,
}

impl RegisterMap {
    /// Empty map; only numeric names resolve
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a map from a RON file
    pub fn load_file(path: &Path) -> NamedResult<Self> {
        let content = fs::read_to_string(path)?;
        let map = Self::from_ron(&content)?;
        log::debug!("Loaded {} registers from {}", map.len(), path.display());
        Ok(map)
    }

    /// Parse a map from RON text
    pub fn from_ron(content: &str) -> NamedResult<Self> {
        let def: MapDef = ron::from_str(content)?;
        let mut map = Self::new();
        for reg in def.registers {
            let mut fields = BTreeMap::new();
            for field in reg.fields {
                if field.name.starts_with(RESERVED_PREFIX) {
                    continue;
                }
                let bits = BitField::new(field.offset, field.width).ok_or_else(|| {
                    NamedError::Validation(format!(
                        "{}.{}: {} bits at {} do not fit 32 bits",
                        reg.name, field.name, field.width, field.offset
                    ))
                })?;
                if fields.insert(field.name.clone(), bits).is_some() {
                    return Err(NamedError::Validation(format!(
                        "{}.{} defined twice",
                        reg.name, field.name
                    )));
                }
            }
            if map.registers.contains_key(&reg.name) {
                return Err(NamedError::Validation(format!(
                    "register {} defined twice",
                    reg.name
                )));
            }
            map.insert(
                reg.name,
                NamedRegister {
                    address: reg.address,
                    reset: reg.reset,
                    fields,
                },
            );
        }
        Ok(map)
    }

    /// Add or replace a register
    pub fn insert(&mut self, name: impl Into<String>, register: NamedRegister) {
        self.registers.insert(name.into(), register);
    }

    /// Look up a register by name
    pub fn get(&self, name: &str) -> Option<&NamedRegister> {
        self.registers.get(name)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Name of the register at `address`
    pub fn name_of(&self, address: u32) -> Option<&str> {
        self.registers
            .iter()
            .find(|(_, reg)| reg.address == address)
            .map(|(name, _)| name.as_str())
    }

    /// (address, reset value) of every register, by address
    pub fn reset_values(&self) -> Vec<(u32, u32)> {
        let mut values: Vec<_> = self
            .registers
            .values()
            .map(|reg| (reg.address, reg.reset))
            .collect();
        values.sort_unstable();
        values
    }

    /// Address and optional field for `name`
    pub fn resolve(&self, name: &str) -> NamedResult<(u32, Option<BitField>)> {
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return parse_number(name)
                .map(|address| (address, None))
                .ok_or_else(|| NamedError::UnknownRegister(name.to_string()));
        }

        let (register, field) = match name.split_once('.') {
            Some((register, field)) => (register, Some(field)),
            None => (name, None),
        };
        let entry = self
            .registers
            .get(register)
            .ok_or_else(|| NamedError::UnknownRegister(register.to_string()))?;
        let bits = match field {
            Some(field) => Some(*entry.fields.get(field).ok_or_else(|| {
                NamedError::UnknownField {
                    register: register.to_string(),
                    field: field.to_string(),
                }
            })?),
            None => None,
        };
        Ok((entry.address, bits))
    }

    /// Write `pairs` as `NAME address value` lines, in hex
    pub fn save_config(&self, out: &mut impl Write, pairs: &[(u32, u32)]) -> io::Result<()> {
        for &(address, value) in pairs {
            let name = self.name_of(address).unwrap_or("-");
            writeln!(out, "{} {:04x} {:04x}", name, address, value)?;
        }
        Ok(())
    }

    /// Read `NAME address value` lines back into pairs
    ///
    /// The name column is informational; the address decides.
    pub fn load_config(input: impl BufRead) -> NamedResult<Vec<(u32, u32)>> {
        let mut pairs = Vec::new();
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bad = |reason| NamedError::Config {
                line: index + 1,
                reason,
            };
            let mut columns = line.split_whitespace().skip(1);
            let address = columns.next().ok_or_else(|| bad("missing address"))?;
            let value = columns.next().ok_or_else(|| bad("missing value"))?;
            let address = u32::from_str_radix(address, 16).map_err(|_| bad("bad address"))?;
            let value = u32::from_str_radix(value, 16).map_err(|_| bad("bad value"))?;
            pairs.push((address, value));
        }
        Ok(pairs)
    }
}

fn parse_number(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

// ============================================================================
// Named access
// ============================================================================

/// A component's [`Registers`] addressed through a [`RegisterMap`]
#[derive(Clone)]
pub struct NamedRegisters {
    registers: Registers,
    map: Arc<RegisterMap>,
}

impl NamedRegisters {
    pub fn new(registers: Registers, map: Arc<RegisterMap>) -> Self {
        Self { registers, map }
    }

    /// Unnamed access
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Read a register or field
    pub fn read(&self, name: &str) -> NamedResult<u32> {
        let (address, field) = self.map.resolve(name)?;
        let value = self.registers.read(address)?;
        Ok(field.map_or(value, |field| field.extract(value)))
    }

    /// Read several registers or fields with one batch read
    pub fn read_many(&self, names: &[&str]) -> NamedResult<Vec<u32>> {
        let targets = names
            .iter()
            .map(|name| self.map.resolve(name))
            .collect::<NamedResult<Vec<_>>>()?;
        let addresses: Vec<u32> = targets.iter().map(|&(address, _)| address).collect();
        let mut values = vec![0; addresses.len()];
        self.registers.read_batch(&addresses, &mut values)?;
        Ok(values
            .into_iter()
            .zip(targets)
            .map(|(value, (_, field))| field.map_or(value, |field| field.extract(value)))
            .collect())
    }

    /// Read consecutive registers starting at a named one
    pub fn read_burst(&self, name: &str, values: &mut [u32]) -> NamedResult<()> {
        let address = self.whole_register(name)?;
        Ok(self.registers.read_burst(address, values)?)
    }

    /// Write a register, or modify only a field's bits
    pub fn write(&self, name: &str, value: u32) -> NamedResult<()> {
        let (address, field) = self.map.resolve(name)?;
        match field {
            Some(field) => {
                check_fits(name, field, value)?;
                self.registers.modify_bits(address, field.mask, field.place(value))?;
            }
            None => self.registers.write(address, value)?,
        }
        Ok(())
    }

    /// Write consecutive registers starting at a named one
    pub fn write_burst(&self, name: &str, values: &[u32]) -> NamedResult<()> {
        let address = self.whole_register(name)?;
        Ok(self.registers.write_burst(address, values)?)
    }

    /// Write a list of named values in order
    ///
    /// Runs of whole registers go out as one batch; every field is its own
    /// modify.
    pub fn write_many(&self, entries: &[(&str, u32)]) -> NamedResult<()> {
        let mut batch = Vec::new();
        for &(name, value) in entries {
            let (address, field) = self.map.resolve(name)?;
            match field {
                Some(field) => {
                    check_fits(name, field, value)?;
                    if !batch.is_empty() {
                        self.registers.write_batch(&batch)?;
                        batch.clear();
                    }
                    self.registers
                        .modify_bits(address, field.mask, field.place(value))?;
                }
                None => batch.push((address, value)),
            }
        }
        if !batch.is_empty() {
            self.registers.write_batch(&batch)?;
        }
        Ok(())
    }

    /// Set bits; for a field, `mask` is relative to the field
    pub fn set_bits(&self, name: &str, mask: u32) -> NamedResult<()> {
        let (address, mask) = self.in_register(name, mask)?;
        Ok(self.registers.set_bits(address, mask)?)
    }

    /// Clear bits; for a field, `mask` is relative to the field
    pub fn clear_bits(&self, name: &str, mask: u32) -> NamedResult<()> {
        let (address, mask) = self.in_register(name, mask)?;
        Ok(self.registers.clear_bits(address, mask)?)
    }

    /// Clear then set bits; for a field, both masks are relative to it
    pub fn modify_bits(&self, name: &str, clear: u32, set: u32) -> NamedResult<()> {
        let (address, field) = self.map.resolve(name)?;
        let (clear, set) = match field {
            Some(field) => (field.place(clear), field.place(set)),
            None => (clear, set),
        };
        Ok(self.registers.modify_bits(address, clear, set)?)
    }

    /// Write every register's reset value
    pub fn write_reset_values(&self) -> NamedResult<()> {
        let values = self.map.reset_values();
        if values.is_empty() {
            return Ok(());
        }
        log::debug!("writing reset values of {} registers", values.len());
        Ok(self.registers.write_batch(&values)?)
    }

    fn whole_register(&self, name: &str) -> NamedResult<u32> {
        match self.map.resolve(name)? {
            (address, None) => Ok(address),
            (_, Some(_)) => Err(NamedError::FieldAccess(name.to_string())),
        }
    }

    fn in_register(&self, name: &str, mask: u32) -> NamedResult<(u32, u32)> {
        let (address, field) = self.map.resolve(name)?;
        Ok((address, field.map_or(mask, |field| field.place(mask))))
    }
}

fn check_fits(name: &str, field: BitField, value: u32) -> NamedResult<()> {
    if value > field.max_value() {
        return Err(NamedError::ValueTooWide {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"(
        registers: [
            (
                name: "MAIN",
                address: 0x00,
                reset: 0x1C8270,
                fields: [
                    (name: "FRAME_START", offset: 0, width: 1),
                    (name: "RSVD_1", offset: 1, width: 3),
                    (name: "LOAD_STRL_PERIODS", offset: 12, width: 4),
                ],
            ),
            (name: "ADC0", address: 0x01),
            (name: "CHIP_ID", address: 0x63, fields: [(name: "DIGITAL_ID", offset: 8, width: 24)]),
        ],
    )"#;

    #[test]
    fn test_load_map() {
        let map = RegisterMap::from_ron(MAP).unwrap();
        assert_eq!(map.len(), 3);
        let main = map.get("MAIN").unwrap();
        assert_eq!(main.reset, 0x1C8270);
        assert_eq!(main.fields.len(), 2, "reserved fields are skipped");
        assert_eq!(map.name_of(0x63), Some("CHIP_ID"));
        assert_eq!(map.name_of(0x10), None);
        assert_eq!(map.reset_values(), vec![(0x00, 0x1C8270), (0x01, 0), (0x63, 0)]);
    }

    #[test]
    fn test_resolve_names() {
        let map = RegisterMap::from_ron(MAP).unwrap();
        assert_eq!(map.resolve("ADC0").unwrap(), (0x01, None));
        assert_eq!(
            map.resolve("MAIN.LOAD_STRL_PERIODS").unwrap(),
            (0x00, Some(BitField { mask: 0xF000, offset: 12 }))
        );
        assert_eq!(map.resolve("0x2a").unwrap(), (0x2A, None));
        assert_eq!(map.resolve("17").unwrap(), (17, None));

        assert!(matches!(map.resolve("NOPE"), Err(NamedError::UnknownRegister(r)) if r == "NOPE"));
        assert!(matches!(
            map.resolve("MAIN.RSVD_1"),
            Err(NamedError::UnknownField { field, .. }) if field == "RSVD_1"
        ));
        assert!(map.resolve("0xZZ").is_err());
    }

    #[test]
    fn test_bit_fields() {
        let field = BitField::new(8, 24).unwrap();
        assert_eq!(field.mask, 0xFFFF_FF00);
        assert_eq!(field.extract(0x1234_5678), 0x12_3456);
        assert_eq!(field.place(0x12_3456), 0x1234_5600);
        assert_eq!(BitField::new(0, 32).unwrap().mask, u32::MAX);
        assert!(BitField::new(30, 4).is_none());
        assert!(BitField::new(3, 0).is_none());
    }

    #[test]
    fn test_invalid_maps() {
        let too_wide = r#"(registers: [(name: "A", address: 0, fields: [(name: "F", offset: 28, width: 8)])])"#;
        assert!(matches!(RegisterMap::from_ron(too_wide), Err(NamedError::Validation(_))));

        let twice = r#"(registers: [(name: "A", address: 0), (name: "A", address: 1)])"#;
        assert!(matches!(RegisterMap::from_ron(twice), Err(NamedError::Validation(_))));

        assert!(matches!(RegisterMap::from_ron("(registers: 3)"), Err(NamedError::Parse(_))));
    }

    #[test]
    fn test_config_text() {
        let map = RegisterMap::from_ron(MAP).unwrap();
        let mut out = Vec::new();
        map.save_config(&mut out, &[(0x00, 0x1C8270), (0x05, 0x12)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "MAIN 0000 1c8270\n- 0005 0012\n");

        let back = RegisterMap::load_config(format!("# saved\n{text}\n").as_bytes()).unwrap();
        assert_eq!(back, vec![(0x00, 0x1C8270), (0x05, 0x12)]);

        let err = RegisterMap::load_config("MAIN 0000\n".as_bytes()).unwrap_err();
        assert!(matches!(err, NamedError::Config { line: 1, reason: "missing value" }));
    }
}
