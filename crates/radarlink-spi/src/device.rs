//! spidev control link
//!
//! Requests are clocked out in one write-only transfer. The board answers
//! on later transfers: the host polls the response header until the
//! first byte holds a request echo (an idle board shifts out `0x00` or
//! `0xFF`), then clocks in the declared data length.

use crate::error::{Phase, Result, Setting, SpiError};

use radarlink_core::link::{check_transfer_size, CloseSignal, LinkState, TransportLink};
use radarlink_core::vendor::wire::RESPONSE_HEADER_LEN;
use radarlink_core::LinkError;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// spidev's own default buffer size
pub const DEFAULT_BUFSIZ: usize = 4096;

/// Default SPI clock speed in Hz (10 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 10_000_000;

/// Default time to wait for a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between two polls of a busy board
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// Must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Configuration for a spidev link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiConfig {
    /// Device node (e.g. "/dev/spidev0.0")
    pub device: PathBuf,
    /// SPI clock speed in Hz
    pub speed_hz: u32,
    /// SPI mode (0-3)
    pub mode: u8,
    /// Largest single transfer; read from sysfs when `None`
    pub bufsiz: Option<usize>,
    /// Time to wait for a response
    pub timeout: Duration,
}

impl SpiConfig {
    /// Default settings for `device`
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
            bufsiz: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Whether a response header byte holds a request echo
pub(crate) fn response_ready(first: u8) -> bool {
    first != 0x00 && first != 0xFF
}

/// Data length announced by a response header
pub(crate) fn announced_len(header: &[u8]) -> usize {
    u16::from_le_bytes([header[3], header[4]]) as usize
}

/// Control link on a spidev node
pub struct SpiLink {
    config: SpiConfig,
    path: String,
    file: Option<File>,
    max_transfer: usize,
    signal: CloseSignal,
}

impl SpiLink {
    /// Link on `config.device`, not yet opened
    pub fn new(config: SpiConfig) -> Self {
        Self {
            path: format!("spi:{}", config.device.display()),
            max_transfer: config.bufsiz.unwrap_or(DEFAULT_BUFSIZ),
            config,
            file: None,
            signal: CloseSignal::new(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    fn open_device(config: &SpiConfig) -> Result<File> {
        log::debug!("spi: Opening device {}", config.device.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| SpiError::Open {
                path: config.device.display().to_string(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        let mode = config.mode;
        unsafe { ioctl::spi_ioc_wr_mode(fd, &mode) }
            .map_err(|e| configure_error(Setting::Mode, mode.into(), e))?;

        let bits: u8 = 8;
        unsafe { ioctl::spi_ioc_wr_bits_per_word(fd, &bits) }
            .map_err(|e| configure_error(Setting::BitsPerWord, bits.into(), e))?;

        let speed = config.speed_hz;
        unsafe { ioctl::spi_ioc_wr_max_speed_hz(fd, &speed) }
            .map_err(|e| configure_error(Setting::MaxSpeedHz, speed, e))?;

        log::info!(
            "spi: Opened {} (mode={}, speed={} kHz)",
            config.device.display(),
            mode,
            speed / 1000
        );
        Ok(file)
    }

    fn file(&self) -> std::result::Result<&File, LinkError> {
        self.file.as_ref().ok_or(LinkError::Closed)
    }
}

fn configure_error(setting: Setting, value: u32, source: nix::errno::Errno) -> SpiError {
    SpiError::Configure {
        setting,
        value,
        source,
    }
}

/// One full-duplex transfer; a missing side shifts zeros or discards input
fn transfer(
    file: &File,
    speed_hz: u32,
    phase: Phase,
    tx: Option<&[u8]>,
    rx: Option<&mut [u8]>,
) -> Result<()> {
    let len = tx.map(|t| t.len()).or(rx.as_ref().map(|r| r.len())).unwrap_or(0);
    if len == 0 {
        return Ok(());
    }
    let xfer = SpiIocTransfer {
        tx_buf: tx.map_or(0, |t| t.as_ptr() as u64),
        rx_buf: rx.map_or(0, |r| r.as_mut_ptr() as u64),
        len: len as u32,
        speed_hz,
        bits_per_word: 8,
        ..Default::default()
    };

    let ret = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            ioctl::spi_ioc_message(1),
            &xfer as *const SpiIocTransfer,
        )
    };
    if ret < 0 {
        return Err(SpiError::Transfer {
            phase,
            len,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn io_error(e: SpiError) -> LinkError {
    log::debug!("spi: {}", e);
    LinkError::from(&e)
}

impl TransportLink for SpiLink {
    fn path(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> std::result::Result<(), LinkError> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = Self::open_device(&self.config).map_err(|e| {
            if e.is_missing() {
                log::debug!("{}: {}", self.path, e);
            } else {
                log::warn!("{}: {}", self.path, e);
            }
            LinkError::from(&e)
        })?;
        self.max_transfer = self.config.bufsiz.unwrap_or_else(kernel_buf_size);
        log::debug!("{}: max transfer {} bytes", self.path, self.max_transfer);
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn state(&self) -> LinkState {
        if self.file.is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    fn max_transfer_size(&self) -> usize {
        self.max_transfer
    }

    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        check_transfer_size(data.len(), self.max_transfer)?;
        self.signal.check()?;
        let file = self.file()?;
        transfer(file, self.config.speed_hz, Phase::Request, Some(data), None).map_err(io_error)?;
        log::trace!("spi write {} bytes", data.len());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> std::result::Result<usize, LinkError> {
        let file = self.file()?;
        let speed = self.config.speed_hz;
        let head = buf.len().min(RESPONSE_HEADER_LEN);

        let started = Instant::now();
        let mut polls = 0u32;
        let polled = self.signal.run_sliced(self.config.timeout, POLL_INTERVAL, |step| {
            transfer(file, speed, Phase::Poll, None, Some(&mut buf[..head])).map_err(io_error)?;
            polls += 1;
            if response_ready(buf[0]) {
                return Ok(());
            }
            self.signal.sleep(step)?;
            Err(LinkError::Timeout)
        });
        if let Err(LinkError::Timeout) = polled {
            return Err(io_error(SpiError::NoResponse {
                polls,
                waited: started.elapsed(),
                last: buf.first().copied().unwrap_or(0),
            }));
        }
        polled?;

        if head < RESPONSE_HEADER_LEN {
            return Ok(head);
        }
        let body = announced_len(buf).min(buf.len() - head);
        transfer(file, speed, Phase::Body, None, Some(&mut buf[head..head + body])).map_err(io_error)?;
        log::trace!("spi read {} bytes", head + body);
        Ok(head + body)
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

/// Read the spidev buffer size from sysfs, or fall back to its default
fn kernel_buf_size() -> usize {
    match std::fs::read_to_string(BUF_SIZE_SYSFS) {
        Ok(content) => match content.trim().parse::<usize>() {
            Ok(size) if size > 0 => size,
            _ => {
                log::warn!("spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
                DEFAULT_BUFSIZ
            }
        },
        Err(_) => {
            log::debug!("spi: Cannot read {}, using {}", BUF_SIZE_SYSFS, DEFAULT_BUFSIZ);
            DEFAULT_BUFSIZ
        }
    }
}

/// Parse board options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<SpiConfig, String> {
    let mut config = SpiConfig::new("");

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = PathBuf::from(value);
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                config.speed_hz = speed_khz
                    .checked_mul(1000)
                    .ok_or_else(|| format!("spispeed too large: {}", value))?;
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                if mode > 3 {
                    return Err(format!("Invalid SPI mode: {} (must be 0-3)", mode));
                }
                config.mode = mode;
            }
            "bufsiz" => {
                let size: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid bufsiz value: {}", value))?;
                if size <= RESPONSE_HEADER_LEN {
                    return Err(format!("bufsiz {} leaves no room for data", size));
                }
                config.bufsiz = Some(size);
            }
            "timeout" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                if ms == 0 {
                    return Err("timeout must be at least 1 ms".to_string());
                }
                config.timeout = Duration::from_millis(ms);
            }
            _ => {
                log::warn!("spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.as_os_str().is_empty() {
        return Err("No device specified. Use dev=/dev/spidevX.Y".to_string());
    }

    Ok(config)
}
