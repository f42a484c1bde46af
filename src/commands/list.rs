//! List commands implementation

use radarlink_core::board::BoardDatabase;
use radarlink_core::component::registry::components;
use radarlink_core::component::Capabilities;

/// List all compiled-in transports
pub fn list_transports() {
    println!("Supported transports:");
    println!();
    for transport in radarlink_board::available_transports() {
        let name = if transport.aliases.is_empty() {
            transport.name.to_string()
        } else {
            format!("{} ({})", transport.name, transport.aliases.join(", "))
        };
        println!("  {:<18} - {}", name, transport.description);
    }
}

fn capability_names(caps: Capabilities) -> String {
    let names: Vec<&str> = [
        (Capabilities::REGISTERS, "registers"),
        (Capabilities::PINS, "pins"),
        (Capabilities::PROTOCOL, "protocol"),
        (Capabilities::MEMORY, "memory"),
    ]
    .iter()
    .filter(|(flag, _)| caps.contains(*flag))
    .map(|(_, name)| *name)
    .collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(",")
    }
}

/// List all addressable component kinds
pub fn list_components() {
    println!(
        "{:<18} {:>6} {:<26} Description",
        "Name", "Wire", "Interfaces"
    );
    println!("{}", "-".repeat(80));

    for info in components() {
        println!(
            "{:<18}  {:02x}:{:02x}  {:<26} {}",
            info.name,
            info.component_type as u8,
            info.implementation,
            capability_names(info.capabilities),
            info.description
        );
    }
}

/// List the boards of the database
pub fn list_boards(db: &BoardDatabase, name_filter: Option<&str>) {
    println!(
        "{:<12} {:<26} {:>9}  {:<14} Components",
        "Vendor", "Name", "ID", "Transports"
    );
    println!("{}", "-".repeat(90));

    for board in db.iter() {
        if let Some(filter) = name_filter {
            if !board.name.to_lowercase().contains(&filter.to_lowercase()) {
                continue;
            }
        }

        let transports: Vec<&str> = board.transports.iter().map(|t| t.name()).collect();
        let components: Vec<String> = board
            .components
            .iter()
            .map(|(kind, count)| format!("{}x{}", count, kind.name()))
            .collect();
        println!(
            "{:<12} {:<26} {:04x}:{:04x}  {:<14} {}",
            board.vendor,
            board.name,
            board.vid,
            board.pid,
            transports.join(","),
            components.join(", ")
        );
    }
}
