//! Board discovery and identity commands

use radarlink_board::{enumerate, open_board, EnumerateOptions};
use radarlink_core::board::{BoardDatabase, BoardFilter, TransportFamily};
use radarlink_core::bridge::Bridge;
use std::net::SocketAddr;
use std::time::Duration;

/// Scan `family` and print every board found
pub fn run_enumerate(
    family: TransportFamily,
    db: &BoardDatabase,
    targets: Vec<SocketAddr>,
    timeout_ms: Option<u64>,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut filter = BoardFilter::any();
    if let Some(name) = name {
        filter = filter.with_name(name);
    }
    let options = EnumerateOptions {
        targets,
        window: timeout_ms.map(Duration::from_millis),
    };

    let boards = enumerate(family, &filter, db, &options)?;
    if boards.is_empty() {
        println!("No {} boards found", family.name());
        return Ok(());
    }
    for (index, board) in boards.iter().enumerate() {
        println!("{:>3}: {}", index, board);
    }
    Ok(())
}

/// Print identity, firmware and components of one board
pub fn run_info(board: &str, db: &BoardDatabase) -> Result<(), Box<dyn std::error::Error>> {
    let handle = open_board(board, db)?;
    let info = handle.info();

    println!("Board Information:");
    println!("  Name:       {}", handle.name());
    println!("  Reported:   {}", info.name);
    println!("  VID:PID:    {:04x}:{:04x}", info.vid, info.pid);
    println!("  Bridge:     {}", handle.bridge().name());

    match handle.version() {
        Ok(version) => println!("  Firmware:   {}", version),
        Err(e) => println!("  Firmware:   unknown ({})", e),
    }
    match handle.bridge().uuid() {
        Ok(uuid) => {
            let hex: String = uuid.iter().map(|b| format!("{:02x}", b)).collect();
            println!("  UUID:       {}", hex);
        }
        Err(e) => log::debug!("UUID not available: {}", e),
    }

    if handle.components().is_empty() {
        println!("  Components: unknown (board not in database)");
    } else {
        println!("  Components:");
        for (kind, count) in handle.components() {
            println!("    {} x{}", kind.name(), count);
        }
    }
    Ok(())
}
