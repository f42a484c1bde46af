//! Memory read command implementation

use indicatif::{ProgressBar, ProgressStyle};
use radarlink_board::open_board;
use radarlink_core::board::BoardDatabase;
use radarlink_core::component::ComponentKind;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Read `length` bytes of board flash starting at `address` into `output`
pub fn run_read_memory(
    board: &str,
    db: &BoardDatabase,
    address: u32,
    length: u32,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = open_board(board, db)?;
    let flash = handle.component(ComponentKind::MemoryFlash, 0)?;
    let memory = flash
        .memory()
        .ok_or("memory-flash component has no memory interface")?;

    let total_size = length as usize;
    let mut data = vec![0u8; total_size];

    let pb = ProgressBar::new(total_size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut offset = 0usize;
    while offset < total_size {
        let chunk_size = std::cmp::min(READ_CHUNK_SIZE, total_size - offset);
        memory.read(address + offset as u32, &mut data[offset..offset + chunk_size])?;
        offset += chunk_size;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
