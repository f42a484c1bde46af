//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the board argument
fn board_help() -> String {
    format!(
        "Board to open, as family[:key=value,...] [available: {}]",
        radarlink_board::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "radarlink")]
#[command(author, version, about = "Radar evaluation board tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory with additional board definitions (.ron files)
    #[arg(long, global = true)]
    pub board_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Transport families on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// USB bulk endpoints
    Usb,
    /// Ethernet (UDP)
    Udp,
    /// Linux spidev
    Spi,
    /// Emulated board
    Mock,
}

/// Component selection shared by the register commands
#[derive(clap::Args, Debug, Clone)]
pub struct ComponentArgs {
    /// Board to open
    #[arg(short, long, help = board_help())]
    pub board: String,

    /// Component name (see list-components)
    #[arg(short, long, default_value = "radar-avian")]
    pub component: String,

    /// Component instance
    #[arg(long, default_value_t = 0)]
    pub id: u8,

    /// Register map (.ron) naming the component's registers and bit fields
    #[arg(long)]
    pub map: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List compiled-in transports
    ListTransports,

    /// List addressable component kinds
    ListComponents,

    /// List known boards
    ListBoards {
        /// Filter by name
        #[arg(long)]
        name: Option<String>,
    },

    /// Scan a transport for boards
    Enumerate {
        /// Transport family to scan
        #[arg(short = 't', long, value_enum)]
        transport: Family,

        /// UDP discovery target (repeatable; defaults to link-local broadcast)
        #[arg(long)]
        target: Vec<SocketAddr>,

        /// How long to wait for UDP answers in milliseconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only report boards whose name contains this
        #[arg(long)]
        name: Option<String>,
    },

    /// Show board identity and firmware version
    Info {
        /// Board to open
        #[arg(short, long, help = board_help())]
        board: String,
    },

    /// Read registers of a component
    ReadRegister {
        #[command(flatten)]
        target: ComponentArgs,

        /// Register address (hex, e.g. 0x02), or REGISTER[.FIELD] from --map
        #[arg(short, long)]
        address: String,

        /// Number of consecutive registers
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Write one register of a component
    WriteRegister {
        #[command(flatten)]
        target: ComponentArgs,

        /// Register address (hex, e.g. 0x02), or REGISTER[.FIELD] from --map
        #[arg(short, long)]
        address: String,

        /// Value to write (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        value: u32,
    },

    /// Set bits in a register with one command
    SetBits {
        #[command(flatten)]
        target: ComponentArgs,

        /// Register address (hex, e.g. 0x02)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Bits to set (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        mask: u32,
    },

    /// Read the board's flash memory to a file
    ReadMemory {
        /// Board to open
        #[arg(short, long, help = board_help())]
        board: String,

        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Receive frames from the data channel
    Stream {
        /// Board to open
        #[arg(short, long, help = board_help())]
        board: String,

        /// Number of frames to receive
        #[arg(short = 'n', long, default_value_t = 100)]
        frames: u64,

        /// Buffer size of every frame in bytes
        #[arg(long, default_value_t = 64 * 1024)]
        frame_size: usize,

        /// Number of frames in the pool
        #[arg(long, default_value_t = 8)]
        pool: usize,

        /// Drop incoming frames instead of blocking when the pool is empty
        #[arg(long)]
        drop: bool,

        /// Write frame data to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
