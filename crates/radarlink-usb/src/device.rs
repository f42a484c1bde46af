//! Bulk endpoint link and frame source for USB boards
//!
//! The board exposes one vendor-class interface. Control requests go out
//! on [`CONTROL_OUT_EP`] and answers come back on [`CONTROL_IN_EP`]; frames
//! stream on [`DATA_IN_EP`] once the data channel is opened.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{Endpoint, Interface, MaybeFuture};
use parking_lot::Mutex;
use radarlink_core::bridge::DataChannel;
use radarlink_core::frame::{FrameInfo, FrameSource};
use radarlink_core::link::{check_transfer_size, CloseSignal, LinkState, TransportLink};
use radarlink_core::LinkError;

use crate::error::{Result, UsbError};
use crate::protocol::*;
use crate::UsbConfig;

/// Claimed vendor interface, shared by the control link and the data channel
pub(crate) type SharedInterface = Arc<Mutex<Option<Interface>>>;

const SLICE: Duration = Duration::from_millis(SLICE_MS);

/// Find, open and claim the first device matching `config`
pub(crate) fn open_interface(config: &UsbConfig) -> Result<Interface> {
    let device_info = nusb::list_devices()
        .wait()
        .map_err(|e| UsbError::OpenFailed(e.to_string()))?
        .find(|d| {
            config.matches(
                d.vendor_id(),
                d.product_id(),
                d.serial_number(),
                d.bus_id(),
                d.device_address(),
            )
        })
        .ok_or(UsbError::DeviceNotFound)?;

    log::info!(
        "Opening USB board {:04x}:{:04x} at bus {} address {}",
        device_info.vendor_id(),
        device_info.product_id(),
        device_info.bus_id(),
        device_info.device_address()
    );

    let device = device_info
        .open()
        .wait()
        .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

    let config_desc = device
        .active_configuration()
        .map_err(|e| UsbError::OpenFailed(format!("Failed to get config: {}", e)))?;

    let iface_num = config_desc
        .interface_alt_settings()
        .find(|iface| iface.class() == VENDOR_CLASS)
        .map(|iface| iface.interface_number())
        .ok_or_else(|| {
            UsbError::OpenFailed("Could not find vendor-specific interface".to_string())
        })?;

    log::debug!("Using interface {}", iface_num);

    device
        .claim_interface(iface_num)
        .wait()
        .map_err(|e| UsbError::ClaimFailed(e.to_string()))
}

/// Map a failed bulk transfer to the link error callers see
///
/// `transfer_blocking` cancels the transfer when its timeout expires.
fn transfer_error(e: TransferError) -> LinkError {
    let e = UsbError::from(e);
    if !e.is_timeout() {
        log::debug!("{}", e);
    }
    LinkError::from(&e)
}

/// Cancel whatever is still queued on `ep` and reap the completions
fn drain(ep: &mut Endpoint<Bulk, Out>) {
    ep.cancel_all();
    while ep.pending() > 0 {
        if ep.wait_next_complete(SLICE).is_none() {
            log::warn!("USB endpoint {:#04x} did not cancel", CONTROL_OUT_EP);
            break;
        }
    }
}

/// Control link over the board's bulk endpoints
pub struct UsbLink {
    config: UsbConfig,
    path: String,
    interface: SharedInterface,
    endpoints: Option<(Endpoint<Bulk, Out>, Endpoint<Bulk, In>)>,
    signal: CloseSignal,
}

impl UsbLink {
    /// Link to the first board matching `config`, not yet opened
    pub fn new(config: UsbConfig) -> Self {
        Self {
            path: format!("usb:{}", config),
            config,
            interface: Arc::new(Mutex::new(None)),
            endpoints: None,
            signal: CloseSignal::new(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &UsbConfig {
        &self.config
    }

    pub(crate) fn interface(&self) -> SharedInterface {
        self.interface.clone()
    }

    fn claim(&self) -> Result<(Interface, Endpoint<Bulk, Out>, Endpoint<Bulk, In>)> {
        let interface = open_interface(&self.config)?;
        let out_ep = interface
            .endpoint::<Bulk, Out>(CONTROL_OUT_EP)
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;
        let in_ep = interface
            .endpoint::<Bulk, In>(CONTROL_IN_EP)
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;
        Ok((interface, out_ep, in_ep))
    }
}

impl TransportLink for UsbLink {
    fn path(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> std::result::Result<(), LinkError> {
        if self.endpoints.is_some() {
            return Ok(());
        }
        let (interface, out_ep, in_ep) = self.claim().map_err(|e| {
            log::warn!("{}: {}", self.path, e);
            LinkError::from(&e)
        })?;
        *self.interface.lock() = Some(interface);
        self.endpoints = Some((out_ep, in_ep));
        Ok(())
    }

    fn close(&mut self) {
        self.endpoints = None;
        self.interface.lock().take();
    }

    fn state(&self) -> LinkState {
        if self.endpoints.is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    fn max_transfer_size(&self) -> usize {
        MAX_TRANSFER
    }

    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        check_transfer_size(data.len(), MAX_TRANSFER)?;
        self.signal.check()?;
        let (out_ep, _) = self.endpoints.as_mut().ok_or(LinkError::Closed)?;

        out_ep.submit(Buffer::from(data.to_vec()));
        let deadline = Instant::now() + self.config.timeout;
        let status = loop {
            if let Some(completion) = out_ep.wait_next_complete(SLICE) {
                break completion.status;
            }
            if self.signal.is_closed() || Instant::now() >= deadline {
                drain(out_ep);
                return Err(if self.signal.is_closed() {
                    LinkError::Closed
                } else {
                    LinkError::Timeout
                });
            }
        };
        // a close that raced with the transfer wins over its outcome
        self.signal.check()?;
        status.map_err(transfer_error)?;

        log::trace!("USB write {} bytes", data.len());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> std::result::Result<usize, LinkError> {
        let (_, in_ep) = self.endpoints.as_mut().ok_or(LinkError::Closed)?;
        let request = request_len(buf.len(), in_ep.max_packet_size());

        let received = self.signal.run_sliced(self.config.timeout, SLICE, |step| {
            let mut in_buf = Buffer::new(request);
            in_buf.set_requested_len(request);
            let data = in_ep
                .transfer_blocking(in_buf, step)
                .into_result()
                .map_err(transfer_error)?;
            let received = data.len().min(buf.len());
            buf[..received].copy_from_slice(&data[..received]);
            Ok(received)
        })?;

        log::trace!("USB read {} bytes", received);
        Ok(received)
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

/// Frame stream on the board's data endpoint
pub struct UsbDataChannel {
    interface: SharedInterface,
    sources: Mutex<Vec<CloseSignal>>,
}

impl UsbDataChannel {
    pub(crate) fn new(interface: SharedInterface) -> Self {
        Self {
            interface,
            sources: Mutex::new(Vec::new()),
        }
    }
}

impl DataChannel for UsbDataChannel {
    fn open_source(&self, frame_size: usize) -> std::result::Result<Box<dyn FrameSource>, LinkError> {
        let interface = self.interface.lock().clone().ok_or(LinkError::Closed)?;
        let ep = interface.endpoint::<Bulk, In>(DATA_IN_EP).map_err(|e| {
            log::warn!("cannot open data endpoint {:#04x}: {}", DATA_IN_EP, e);
            LinkError::Unavailable
        })?;
        let request = request_len(frame_size + FRAME_HEADER_LEN, ep.max_packet_size());
        log::debug!("USB data source open, {} byte requests", request);

        let signal = CloseSignal::new();
        self.sources.lock().push(signal.clone());
        Ok(Box::new(UsbFrameSource {
            ep,
            request,
            signal,
        }))
    }

    fn close(&self) {
        for signal in self.sources.lock().drain(..) {
            signal.close();
        }
    }
}

/// Reads one frame per bulk transfer
pub struct UsbFrameSource {
    ep: Endpoint<Bulk, In>,
    request: usize,
    signal: CloseSignal,
}

impl FrameSource for UsbFrameSource {
    fn receive_frame(&mut self, buf: &mut [u8]) -> std::result::Result<FrameInfo, LinkError> {
        self.signal.check()?;
        let mut in_buf = Buffer::new(self.request);
        in_buf.set_requested_len(self.request);
        let data = self
            .ep
            .transfer_blocking(in_buf, SLICE)
            .into_result()
            .map_err(transfer_error)?;
        self.signal.check()?;

        let n = data.len().min(buf.len());
        if n < FRAME_HEADER_LEN {
            log::warn!("discarding {} byte transfer without frame header", n);
            return Err(LinkError::Timeout);
        }
        buf[..n].copy_from_slice(&data[..n]);
        Ok(FrameInfo {
            offset: FRAME_HEADER_LEN,
            size: n - FRAME_HEADER_LEN,
            status: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        })
    }
}
