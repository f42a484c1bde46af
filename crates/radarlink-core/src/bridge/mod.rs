//! Bridges: control and data channels over a transport link
//!
//! A [`Bridge`] owns one transport link and exposes up to two logical
//! channels:
//!
//! - a [`ControlChannel`] for request/response vendor commands, guarded by
//!   one lock per bridge so that the chunks of two logical commands never
//!   interleave
//! - an optional [`DataChannel`] producing streamed frames
//!
//! Bridges may be stacked: [`ProtocolBridge`] wraps any bridge and adds
//! board-level queries while forwarding connection state untouched.

mod control;
mod protocol;

pub use control::{ControlChannel, Transaction};
pub use protocol::{BoardInfo, ProtocolBridge, VersionInfo};

use crate::error::LinkError;
use crate::frame::FrameSource;
use std::ops::Deref;
use std::sync::Arc;

/// Logical connection multiplexing control and data over one link
pub trait Bridge: Send + Sync {
    /// Name used in log output (usually the link path)
    fn name(&self) -> &str;

    /// Open the underlying link. No-op when already open.
    fn open(&self) -> Result<(), LinkError>;

    /// Close the underlying link
    ///
    /// Commands in flight return [`LinkError::Closed`]. Frames obtained
    /// through the data channel stay valid.
    fn close(&self);

    /// Whether the underlying link is open
    fn is_connected(&self) -> bool;

    /// Control channel, if the transport has one
    fn control(&self) -> Option<Arc<ControlChannel>>;

    /// Data channel, if the transport has one
    fn data(&self) -> Option<Arc<dyn DataChannel>>;
}

/// Streamed data path of a bridge
pub trait DataChannel: Send + Sync {
    /// Open a source producing frames of at most `frame_size` bytes
    fn open_source(&self, frame_size: usize) -> Result<Box<dyn FrameSource>, LinkError>;

    /// Stop every source opened from this channel
    fn close(&self);
}

/// Bridge made of a control channel and an optional data channel
///
/// This is what the concrete transports build; only the link and the data
/// source differ between them.
pub struct LinkBridge {
    name: String,
    control: Arc<ControlChannel>,
    data: Option<Arc<dyn DataChannel>>,
}

impl LinkBridge {
    /// Bridge with a control channel only
    pub fn control_only(control: ControlChannel) -> Self {
        Self {
            name: control.path().to_string(),
            control: Arc::new(control),
            data: None,
        }
    }

    /// Bridge with control and data channels
    pub fn with_data(control: ControlChannel, data: Arc<dyn DataChannel>) -> Self {
        Self {
            data: Some(data),
            ..Self::control_only(control)
        }
    }
}

impl Bridge for LinkBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), LinkError> {
        self.control.open()
    }

    fn close(&self) {
        if let Some(data) = &self.data {
            data.close();
        }
        self.control.close();
    }

    fn is_connected(&self) -> bool {
        self.control.is_open()
    }

    fn control(&self) -> Option<Arc<ControlChannel>> {
        Some(self.control.clone())
    }

    fn data(&self) -> Option<Arc<dyn DataChannel>> {
        self.data.clone()
    }
}

impl<B: Bridge + ?Sized> Bridge for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&self) -> Result<(), LinkError> {
        (**self).open()
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn control(&self) -> Option<Arc<ControlChannel>> {
        (**self).control()
    }

    fn data(&self) -> Option<Arc<dyn DataChannel>> {
        (**self).data()
    }
}

/// An opened bridge that is closed again when dropped
pub struct Connection<B: Bridge> {
    bridge: B,
}

impl<B: Bridge> Connection<B> {
    /// Open `bridge` for the lifetime of the returned guard
    pub fn open(bridge: B) -> Result<Self, LinkError> {
        bridge.open()?;
        log::debug!("{}: connected", bridge.name());
        Ok(Self { bridge })
    }
}

impl<B: Bridge> Deref for Connection<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.bridge
    }
}

impl<B: Bridge> Drop for Connection<B> {
    fn drop(&mut self) {
        self.bridge.close();
        log::debug!("{}: disconnected", self.bridge.name());
    }
}
