//! radarlink-core - Core library for talking to radar evaluation boards
//!
//! This crate provides the transport-independent half of the device
//! communication stack:
//!
//! - [`link`]: the [`TransportLink`](link::TransportLink) trait every
//!   physical transport implements (USB, UDP, SPI)
//! - [`bridge`]: control and data channels on top of a link, with the
//!   per-bridge command lock
//! - [`vendor`]: the vendor command protocol, including chunking of
//!   payloads larger than one transfer
//! - [`component`]: the static component registry and the register, pin,
//!   protocol and memory proxies built on it
//! - [`frame`]: the frame pool and the stream receive loop
//! - [`board`]: board descriptors, the board database and the enumerator
//!   trait
//!
//! Transports live in their own crates (`radarlink-udp`, `radarlink-usb`,
//! `radarlink-spi`); `radarlink-mock` provides an in-memory board for
//! tests.
//!
//! # Example
//!
//! ```ignore
//! use radarlink_core::bridge::Bridge;
//! use radarlink_core::component::{Component, ComponentAccess, ComponentKind};
//!
//! let bridge = descriptor.create_bridge()?;
//! bridge.open()?;
//! let control = bridge.control().expect("board has a control channel");
//! let radar = Component::new(control, ComponentKind::RadarAvian, 0);
//! let chip_id = radar.registers().unwrap().read(0x02)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod board;
pub mod bridge;
pub mod component;
pub mod error;
pub mod frame;
pub mod link;
pub mod vendor;

pub use error::{Error, LinkError, PoolError, ProtocolError, Result};
