//! radarlink - Command line tool for radar evaluation boards
//!
//! Boards are reached over USB, Ethernet or SPI. Every command takes a
//! board string (`udp:ip=169.254.1.101`, `usb`, `mock`, ...) and works the
//! same on every transport:
//!
//! - **Discovery**: `enumerate` scans one transport family
//! - **Identity**: `info` queries name, firmware version and components
//! - **Registers**: `read-register`, `write-register`, `set-bits`
//! - **Data**: `stream` receives frames through the frame pool

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, Family};
use radarlink_core::board::{BoardDatabase, TransportFamily};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_board_database(cli.board_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load board database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} board definitions", db.len());

    let result = match cli.command {
        Commands::ListTransports => {
            commands::list_transports();
            Ok(())
        }
        Commands::ListComponents => {
            commands::list_components();
            Ok(())
        }
        Commands::ListBoards { name } => {
            commands::list_boards(&db, name.as_deref());
            Ok(())
        }
        Commands::Enumerate {
            transport,
            target,
            timeout,
            name,
        } => commands::run_enumerate(
            family(transport),
            &db,
            target,
            timeout,
            name.as_deref(),
        ),
        Commands::Info { board } => commands::run_info(&board, &db),
        Commands::ReadRegister {
            target,
            address,
            count,
        } => commands::run_read_register(&target, &db, &address, count),
        Commands::WriteRegister {
            target,
            address,
            value,
        } => commands::run_write_register(&target, &db, &address, value),
        Commands::SetBits {
            target,
            address,
            mask,
        } => commands::run_set_bits(&target, &db, address, mask),
        Commands::ReadMemory {
            board,
            address,
            length,
            output,
        } => commands::run_read_memory(&board, &db, address, length, &output),
        Commands::Stream {
            board,
            frames,
            frame_size,
            pool,
            drop,
            output,
        } => commands::run_stream(
            &board,
            &db,
            commands::StreamArgs {
                frames,
                frame_size,
                pool,
                drop,
                output,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn family(family: Family) -> TransportFamily {
    match family {
        Family::Usb => TransportFamily::Usb,
        Family::Udp => TransportFamily::Udp,
        Family::Spi => TransportFamily::Spi,
        Family::Mock => TransportFamily::Mock,
    }
}

/// Built-in boards plus the definitions found in `path`
fn load_board_database(path: Option<&Path>) -> Result<BoardDatabase, Box<dyn std::error::Error>> {
    let mut db = BoardDatabase::builtin();

    if let Some(path) = path {
        let count = if path.is_dir() {
            db.load_dir(path)?
        } else {
            db.load_file(path)?
        };
        log::info!("Loaded {} board definitions from {:?}", count, path);
    }

    Ok(db)
}
