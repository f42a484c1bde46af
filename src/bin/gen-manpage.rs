//! Man page generator for radarlink
//!
//! Writes `radarlink.1` plus one `radarlink-<command>.1` page per
//! subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();

    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut buffer)?;
    render_board_section(&mut buffer)?;
    let main_page = write_page(&output_dir, "radarlink", &buffer)?;

    let mut pages = 1;
    for sub in cmd.get_subcommands() {
        let title = format!("radarlink-{}", sub.get_name());
        let mut buffer = Vec::new();
        clap_mangen::Man::new(sub.clone())
            .title(title.clone())
            .render(&mut buffer)?;
        write_page(&output_dir, &title, &buffer)?;
        pages += 1;
    }

    println!("{} man pages generated in {}", pages, output_dir.display());
    println!("\nTo view the main page:");
    println!("  man -l {}", main_page.display());
    Ok(())
}

/// Board string syntax, which clap only knows as free text
fn render_board_section(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, ".SH BOARDS")?;
    writeln!(
        out,
        "Boards are named as \\fIfamily\\fR[:\\fIkey\\fR=\\fIvalue\\fR,...]."
    )?;
    writeln!(
        out,
        "Known families: {}.",
        radarlink_board::transport_names_short()
    )?;
    writeln!(out, ".PP")?;
    writeln!(out, "usb:vid=0x058b,pid=0x0251")?;
    writeln!(out, ".br")?;
    writeln!(out, "udp:ip=169.254.1.101,dataport=55056")?;
    writeln!(out, ".br")?;
    writeln!(out, "spi:dev=/dev/spidev0.0,spispeed=10000")
}

fn write_page(dir: &Path, title: &str, page: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{}.1", title));
    fs::write(&path, page)?;
    Ok(path)
}
