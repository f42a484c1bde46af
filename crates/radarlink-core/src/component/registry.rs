//! Static component registry
//!
//! The registry is a build-time table of every (type, implementation) pair
//! the protocol can address. It performs no I/O; proxies consult it to
//! build the [`ComponentAddress`] they stamp on every command.

use super::address::{ComponentAddress, ComponentType, SubInterface};
use bitflags::bitflags;
use once_cell::sync::Lazy;
use std::collections::HashMap;

bitflags! {
    /// Sub-interfaces a component implementation provides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Register file access
        const REGISTERS = 1 << 0;
        /// Reset, interrupt and detection pins
        const PINS = 1 << 1;
        /// Chip-specific command protocol
        const PROTOCOL = 1 << 2;
        /// Memory read/write/erase
        const MEMORY = 1 << 3;
    }
}

/// Width of a register address or value on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// One byte
    U8,
    /// Two bytes, little endian
    U16,
    /// Four bytes, little endian
    U32,
}

impl Width {
    /// Number of bytes on the wire
    pub const fn bytes(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U32 => 4,
        }
    }

    /// Largest value representable in this width
    pub const fn max_value(self) -> u32 {
        match self {
            Width::U8 => 0xFF,
            Width::U16 => 0xFFFF,
            Width::U32 => 0xFFFF_FFFF,
        }
    }

    /// Append `value` in this width, little endian
    pub fn put(self, value: u32, out: &mut Vec<u8>) {
        out.extend_from_slice(&value.to_le_bytes()[..self.bytes()]);
    }

    /// Decode the first `bytes()` bytes of `bytes`, little endian
    pub fn get(self, bytes: &[u8]) -> u32 {
        let mut raw = [0u8; 4];
        raw[..self.bytes()].copy_from_slice(&bytes[..self.bytes()]);
        u32::from_le_bytes(raw)
    }
}

/// Address and value widths of a register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterLayout {
    /// Register address width
    pub address: Width,
    /// Register value width
    pub value: Width,
}

impl RegisterLayout {
    const fn new(address: Width, value: Width) -> Self {
        Self { address, value }
    }

    /// Bytes of one (address, value) pair on the wire
    pub const fn pair_len(&self) -> usize {
        self.address.bytes() + self.value.bytes()
    }
}

/// Every component the protocol can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// The board itself
    Board,
    /// RXS radar family
    RadarRxs,
    /// CTRX radar family
    RadarCtrx,
    /// Avian radar family
    RadarAvian,
    /// ATR22 radar family
    RadarAtr22,
    /// LTR11 radar family
    RadarLtr11,
    /// Generic power supply
    PowerSupply,
    /// MAX20430 power supply
    PowerSupplyMax20430,
    /// Generic power amplifier
    PowerAmplifier,
    /// Generic processing radar
    ProcessingRadar,
    /// SPI flash memory
    MemoryFlash,
}

/// Registry entry
#[derive(Debug)]
pub struct ComponentInfo {
    /// Kind this entry describes
    pub kind: ComponentKind,
    /// Unique name (used on the command line and in log output)
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Wire type
    pub component_type: ComponentType,
    /// Wire implementation byte
    pub implementation: u8,
    /// Available sub-interfaces
    pub capabilities: Capabilities,
    /// Register file layout, if the component has registers
    pub registers: Option<RegisterLayout>,
}

const RP: Capabilities = Capabilities::REGISTERS.union(Capabilities::PROTOCOL);
const RPP: Capabilities = RP.union(Capabilities::PINS);

static COMPONENTS: &[ComponentInfo] = &[
    ComponentInfo {
        kind: ComponentKind::Board,
        name: "board",
        description: "Board-level queries (identity, firmware version)",
        component_type: ComponentType::Board,
        implementation: 0x00,
        capabilities: Capabilities::empty(),
        registers: None,
    },
    ComponentInfo {
        kind: ComponentKind::RadarRxs,
        name: "radar-rxs",
        description: "RXS automotive radar transceiver",
        component_type: ComponentType::Radar,
        implementation: 0x01,
        capabilities: RP,
        registers: Some(RegisterLayout::new(Width::U16, Width::U16)),
    },
    ComponentInfo {
        kind: ComponentKind::RadarCtrx,
        name: "radar-ctrx",
        description: "CTRX automotive radar transceiver",
        component_type: ComponentType::Radar,
        implementation: 0x02,
        capabilities: RP,
        registers: Some(RegisterLayout::new(Width::U16, Width::U32)),
    },
    ComponentInfo {
        kind: ComponentKind::RadarAvian,
        name: "radar-avian",
        description: "Avian 60 GHz FMCW radar sensor",
        component_type: ComponentType::Radar,
        implementation: 0x03,
        capabilities: RPP,
        registers: Some(RegisterLayout::new(Width::U8, Width::U32)),
    },
    ComponentInfo {
        kind: ComponentKind::RadarAtr22,
        name: "radar-atr22",
        description: "ATR22 24 GHz radar sensor",
        component_type: ComponentType::Radar,
        implementation: 0x04,
        capabilities: RPP,
        registers: Some(RegisterLayout::new(Width::U16, Width::U16)),
    },
    ComponentInfo {
        kind: ComponentKind::RadarLtr11,
        name: "radar-ltr11",
        description: "LTR11 24 GHz Doppler radar sensor",
        component_type: ComponentType::Radar,
        implementation: 0x05,
        capabilities: RPP,
        registers: Some(RegisterLayout::new(Width::U8, Width::U16)),
    },
    ComponentInfo {
        kind: ComponentKind::PowerSupply,
        name: "power-supply",
        description: "Generic power supply",
        component_type: ComponentType::PowerSupply,
        implementation: 0x00,
        capabilities: Capabilities::REGISTERS,
        registers: Some(RegisterLayout::new(Width::U8, Width::U8)),
    },
    ComponentInfo {
        kind: ComponentKind::PowerSupplyMax20430,
        name: "power-max20430",
        description: "MAX20430 automotive PMIC",
        component_type: ComponentType::PowerSupply,
        implementation: 0x01,
        capabilities: Capabilities::REGISTERS.union(Capabilities::PINS),
        registers: Some(RegisterLayout::new(Width::U8, Width::U8)),
    },
    ComponentInfo {
        kind: ComponentKind::PowerAmplifier,
        name: "power-amplifier",
        description: "Generic power amplifier",
        component_type: ComponentType::PowerAmplifier,
        implementation: 0x00,
        capabilities: Capabilities::REGISTERS,
        registers: Some(RegisterLayout::new(Width::U8, Width::U8)),
    },
    ComponentInfo {
        kind: ComponentKind::ProcessingRadar,
        name: "processing-radar",
        description: "Radar with on-chip signal processing",
        component_type: ComponentType::ProcessingRadar,
        implementation: 0x00,
        capabilities: RP,
        registers: Some(RegisterLayout::new(Width::U16, Width::U32)),
    },
    ComponentInfo {
        kind: ComponentKind::MemoryFlash,
        name: "memory-flash",
        description: "SPI NOR flash",
        component_type: ComponentType::NonvolatileMemory,
        implementation: 0x01,
        capabilities: Capabilities::MEMORY,
        registers: None,
    },
];

static BY_WIRE: Lazy<HashMap<(u8, u8), &'static ComponentInfo>> = Lazy::new(|| {
    COMPONENTS
        .iter()
        .map(|info| ((info.component_type as u8, info.implementation), info))
        .collect()
});

static BY_NAME: Lazy<HashMap<&'static str, &'static ComponentInfo>> =
    Lazy::new(|| COMPONENTS.iter().map(|info| (info.name, info)).collect());

/// Every registered component
pub fn components() -> &'static [ComponentInfo] {
    COMPONENTS
}

/// Find the entry for a (type, implementation) wire pair
pub fn lookup(component_type: u8, implementation: u8) -> Option<&'static ComponentInfo> {
    BY_WIRE.get(&(component_type, implementation)).copied()
}

impl ComponentKind {
    /// Registry entry for this kind
    pub fn info(self) -> &'static ComponentInfo {
        // COMPONENTS has exactly one entry per kind, in declaration order
        let info = &COMPONENTS[self as usize];
        debug_assert_eq!(info.kind, self);
        info
    }

    /// Look a kind up by its registry name
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name).map(|info| info.kind)
    }

    /// Registry name
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Address of one instance and sub-interface of this component
    pub fn address(self, instance_id: u8, sub_interface: SubInterface) -> ComponentAddress {
        let info = self.info();
        ComponentAddress::new(
            info.component_type,
            info.implementation,
            instance_id,
            sub_interface,
        )
    }

    /// Available sub-interfaces
    pub fn capabilities(self) -> Capabilities {
        self.info().capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_order_matches_kinds() {
        for (index, info) in COMPONENTS.iter().enumerate() {
            assert_eq!(info.kind as usize, index, "{} out of order", info.name);
        }
    }

    #[test]
    fn test_wire_pairs_and_names_unique() {
        let pairs: HashSet<_> = COMPONENTS
            .iter()
            .map(|info| (info.component_type as u8, info.implementation))
            .collect();
        let names: HashSet<_> = COMPONENTS.iter().map(|info| info.name).collect();
        assert_eq!(pairs.len(), COMPONENTS.len());
        assert_eq!(names.len(), COMPONENTS.len());
    }

    #[test]
    fn test_lookup() {
        let info = lookup(0x01, 0x03).unwrap();
        assert_eq!(info.kind, ComponentKind::RadarAvian);
        assert!(info.capabilities.contains(Capabilities::PROTOCOL));
        assert!(lookup(0x01, 0x10).is_none());
        assert_eq!(ComponentKind::from_name("radar-ltr11"), Some(ComponentKind::RadarLtr11));
        assert_eq!(ComponentKind::from_name("radar-bgt60"), None);
    }

    #[test]
    fn test_register_components_have_layout() {
        for info in COMPONENTS {
            assert_eq!(
                info.capabilities.contains(Capabilities::REGISTERS),
                info.registers.is_some(),
                "{}",
                info.name
            );
        }
    }

    #[test]
    fn test_width_codec() {
        let mut out = Vec::new();
        Width::U16.put(0x12345678, &mut out);
        assert_eq!(out, [0x78, 0x56]);
        assert_eq!(Width::U16.get(&out), 0x5678);
        assert_eq!(Width::U8.max_value(), 0xFF);
    }
}
