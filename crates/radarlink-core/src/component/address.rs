//! Component addressing

use super::registry;
use crate::error::ProtocolError;
use core::fmt;

/// Component type, first byte of every address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentType {
    /// The board itself (bridge-level queries)
    Board = 0x00,
    /// Radar front-end
    Radar = 0x01,
    /// Power supply IC
    PowerSupply = 0x02,
    /// Power amplifier
    PowerAmplifier = 0x03,
    /// Radar with on-chip processing
    ProcessingRadar = 0x04,
    /// Non-volatile memory
    NonvolatileMemory = 0x05,
}

impl ComponentType {
    /// Decode a wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Board),
            0x01 => Some(Self::Radar),
            0x02 => Some(Self::PowerSupply),
            0x03 => Some(Self::PowerAmplifier),
            0x04 => Some(Self::ProcessingRadar),
            0x05 => Some(Self::NonvolatileMemory),
            _ => None,
        }
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::Radar => "radar",
            Self::PowerSupply => "power-supply",
            Self::PowerAmplifier => "power-amplifier",
            Self::ProcessingRadar => "processing-radar",
            Self::NonvolatileMemory => "memory",
        }
    }
}

/// Sub-interface of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubInterface {
    /// Component-level functions
    Default = 0x00,
    /// Register file access
    Registers = 0x01,
    /// GPIO lines wired to the component
    Pins = 0x02,
    /// Chip-specific command protocol
    Protocol = 0x03,
}

impl SubInterface {
    /// Decode a wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Default),
            0x01 => Some(Self::Registers),
            0x02 => Some(Self::Pins),
            0x03 => Some(Self::Protocol),
            _ => None,
        }
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Registers => "registers",
            Self::Pins => "pins",
            Self::Protocol => "protocol",
        }
    }
}

/// Address of one logical sub-device behind a bridge
///
/// Only (type, implementation) pairs present in the component registry can
/// be constructed; use [`ComponentKind::address`](super::ComponentKind::address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentAddress {
    component_type: ComponentType,
    implementation: u8,
    instance_id: u8,
    sub_interface: SubInterface,
}

impl ComponentAddress {
    /// Address of the board itself
    pub const BOARD: Self = Self {
        component_type: ComponentType::Board,
        implementation: 0,
        instance_id: 0,
        sub_interface: SubInterface::Default,
    };

    pub(crate) const fn new(
        component_type: ComponentType,
        implementation: u8,
        instance_id: u8,
        sub_interface: SubInterface,
    ) -> Self {
        Self {
            component_type,
            implementation,
            instance_id,
            sub_interface,
        }
    }

    /// Decode address bytes as found in a request header
    ///
    /// Fails if the (type, implementation) pair is not registered.
    pub fn from_wire(bytes: [u8; 4]) -> Result<Self, ProtocolError> {
        let [component_type, implementation, instance_id, sub_interface] = bytes;
        let info = registry::lookup(component_type, implementation)
            .ok_or(ProtocolError::Malformed("unknown component"))?;
        let sub_interface = SubInterface::from_u8(sub_interface)
            .ok_or(ProtocolError::Malformed("unknown sub-interface"))?;
        Ok(Self::new(
            info.component_type,
            implementation,
            instance_id,
            sub_interface,
        ))
    }

    /// Address bytes in header order
    pub fn to_wire(&self) -> [u8; 4] {
        [
            self.component_type as u8,
            self.implementation,
            self.instance_id,
            self.sub_interface as u8,
        ]
    }

    /// Component type
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Implementation byte
    pub fn implementation(&self) -> u8 {
        self.implementation
    }

    /// Instance id
    pub fn instance_id(&self) -> u8 {
        self.instance_id
    }

    /// Sub-interface
    pub fn sub_interface(&self) -> SubInterface {
        self.sub_interface
    }

    /// Same component, different sub-interface
    pub fn with_sub_interface(self, sub_interface: SubInterface) -> Self {
        Self {
            sub_interface,
            ..self
        }
    }
}

impl fmt::Display for ComponentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match registry::lookup(self.component_type as u8, self.implementation) {
            Some(info) => write!(
                f,
                "{}#{}/{}",
                info.name,
                self.instance_id,
                self.sub_interface.name()
            ),
            None => write!(
                f,
                "{}:{:02x}#{}/{}",
                self.component_type.name(),
                self.implementation,
                self.instance_id,
                self.sub_interface.name()
            ),
        }
    }
}
