//! Stream command implementation

use indicatif::{ProgressBar, ProgressStyle};
use radarlink_board::open_board;
use radarlink_core::board::BoardDatabase;
use radarlink_core::frame::{OverflowPolicy, StreamConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

/// How long to wait for one frame before giving up
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Options of the stream command
pub struct StreamArgs {
    /// Frames to receive
    pub frames: u64,
    /// Buffer size of every frame
    pub frame_size: usize,
    /// Frames in the pool
    pub pool: usize,
    /// Drop instead of block on an empty pool
    pub drop: bool,
    /// Frame data destination
    pub output: Option<PathBuf>,
}

/// Receive `args.frames` frames and report throughput
pub fn run_stream(
    board: &str,
    db: &BoardDatabase,
    args: StreamArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = open_board(board, db)?;
    let config = StreamConfig {
        frame_size: args.frame_size,
        frame_count: args.pool,
        overflow: if args.drop {
            OverflowPolicy::Drop
        } else {
            OverflowPolicy::Block
        },
        ..StreamConfig::default()
    };

    let mut out = match &args.output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut stream = handle.start_stream(&config)?;

    let pb = ProgressBar::new(args.frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({per_sec}) {msg}")?
            .progress_chars("#>-"),
    );

    let mut bytes = 0u64;
    for _ in 0..args.frames {
        let frame = stream.next_frame(FRAME_TIMEOUT)?;
        bytes += frame.data_size() as u64;
        if frame.status() != 0 {
            log::warn!("Frame with status {:#x}", frame.status());
        }
        if let Some(out) = out.as_mut() {
            out.write_all(frame.data())?;
        }
        pb.inc(1);
        let stats = stream.stats();
        if stats.dropped > 0 {
            pb.set_message(format!("{} dropped", stats.dropped));
        }
        frame.release();
    }
    pb.finish_with_message("done");

    let stats = stream.stats();
    stream.stop();
    if let Some(mut out) = out {
        out.flush()?;
    }

    println!(
        "Received {} frames ({} bytes), {} dropped",
        args.frames, bytes, stats.dropped
    );
    Ok(())
}
