//! Component registry, addressing and remote proxies
//!
//! One bridge can reach many logical sub-devices. Each is identified by a
//! [`ComponentAddress`] built from the static registry, and accessed
//! through proxies ([`Registers`], [`Pins`], [`Protocol`], [`Memory`])
//! that stamp that address on every vendor command. Proxies hold no
//! dispatch state of their own, so any number of them can share a bridge.

mod address;
mod memory;
mod named;
mod pins;
mod protocol;
mod registers;
pub mod registry;

pub use address::{ComponentAddress, ComponentType, SubInterface};
pub use memory::Memory;
pub use named::{BitField, NamedError, NamedRegister, NamedRegisters, NamedResult, RegisterMap};
pub use pins::{DetectionPins, Pins};
pub use protocol::Protocol;
pub use registers::Registers;
pub use registry::{Capabilities, ComponentInfo, ComponentKind, RegisterLayout, Width};

use crate::bridge::ControlChannel;
use crate::vendor::VendorCommands;
use std::sync::Arc;

/// Access to one component instance through the sub-interfaces it has
pub trait ComponentAccess {
    /// Register file, if any
    fn registers(&self) -> Option<&Registers>;
    /// Pins, if any
    fn pins(&self) -> Option<&Pins>;
    /// Command protocol, if any
    fn protocol(&self) -> Option<&Protocol>;
}

/// Proxy for one component instance
#[derive(Clone)]
pub struct Component {
    kind: ComponentKind,
    instance_id: u8,
    registers: Option<Registers>,
    pins: Option<Pins>,
    protocol: Option<Protocol>,
    memory: Option<Memory>,
}

impl Component {
    /// Build the proxies `kind` supports
    pub fn new(control: Arc<ControlChannel>, kind: ComponentKind, instance_id: u8) -> Self {
        let info = kind.info();
        let commands = |sub| VendorCommands::new(control.clone(), kind.address(instance_id, sub));
        let caps = info.capabilities;

        Self {
            kind,
            instance_id,
            registers: info
                .registers
                .filter(|_| caps.contains(Capabilities::REGISTERS))
                .map(|layout| Registers::new(commands(SubInterface::Registers), layout)),
            pins: caps
                .contains(Capabilities::PINS)
                .then(|| Pins::new(commands(SubInterface::Pins))),
            protocol: caps
                .contains(Capabilities::PROTOCOL)
                .then(|| Protocol::new(commands(SubInterface::Protocol))),
            memory: caps
                .contains(Capabilities::MEMORY)
                .then(|| Memory::new(commands(SubInterface::Default))),
        }
    }

    /// Component kind
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Instance id
    pub fn instance_id(&self) -> u8 {
        self.instance_id
    }

    /// Memory access, if any
    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    /// Register access by the names in `map`, if the component has registers
    pub fn named_registers(&self, map: Arc<RegisterMap>) -> Option<NamedRegisters> {
        self.registers
            .clone()
            .map(|registers| NamedRegisters::new(registers, map))
    }
}

impl ComponentAccess for Component {
    fn registers(&self) -> Option<&Registers> {
        self.registers.as_ref()
    }

    fn pins(&self) -> Option<&Pins> {
        self.pins.as_ref()
    }

    fn protocol(&self) -> Option<&Protocol> {
        self.protocol.as_ref()
    }
}

/// A radar front-end, one variant per supported family
#[derive(Clone)]
pub enum RadarComponent {
    /// RXS family
    Rxs(Component),
    /// CTRX family
    Ctrx(Component),
    /// Avian family
    Avian(Component),
    /// ATR22 family
    Atr22(Component),
    /// LTR11 family
    Ltr11(Component),
}

impl RadarComponent {
    /// Radar proxy for `kind`, or `None` if `kind` is not a radar
    pub fn new(control: Arc<ControlChannel>, kind: ComponentKind, instance_id: u8) -> Option<Self> {
        let component = || Component::new(control.clone(), kind, instance_id);
        Some(match kind {
            ComponentKind::RadarRxs => Self::Rxs(component()),
            ComponentKind::RadarCtrx => Self::Ctrx(component()),
            ComponentKind::RadarAvian => Self::Avian(component()),
            ComponentKind::RadarAtr22 => Self::Atr22(component()),
            ComponentKind::RadarLtr11 => Self::Ltr11(component()),
            _ => return None,
        })
    }

    /// Underlying component proxy
    pub fn component(&self) -> &Component {
        match self {
            Self::Rxs(c) | Self::Ctrx(c) | Self::Avian(c) | Self::Atr22(c) | Self::Ltr11(c) => c,
        }
    }
}

impl ComponentAccess for RadarComponent {
    fn registers(&self) -> Option<&Registers> {
        self.component().registers()
    }

    fn pins(&self) -> Option<&Pins> {
        self.component().pins()
    }

    fn protocol(&self) -> Option<&Protocol> {
        self.component().protocol()
    }
}
