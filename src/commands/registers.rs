//! Register commands implementation

use crate::cli::ComponentArgs;
use radarlink_board::{open_board, BoardHandle};
use radarlink_core::board::BoardDatabase;
use radarlink_core::component::{
    Component, ComponentAccess, ComponentKind, NamedRegisters, RegisterMap, Registers,
};
use std::sync::Arc;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn resolve(kind_name: &str) -> Result<ComponentKind, Box<dyn std::error::Error>> {
    ComponentKind::from_name(kind_name).ok_or_else(|| {
        format!(
            "Unknown component: {} (see list-components)",
            kind_name
        )
        .into()
    })
}

/// Open the board and the component named by `args`
fn open_component(
    args: &ComponentArgs,
    db: &BoardDatabase,
) -> Result<(BoardHandle, Component), Box<dyn std::error::Error>> {
    let kind = resolve(&args.component)?;
    let handle = open_board(&args.board, db)?;
    if !handle.components().is_empty()
        && !handle.components().iter().any(|(k, count)| *k == kind && args.id < *count)
    {
        log::warn!(
            "{} does not list {} instance {}",
            handle.name(),
            kind.name(),
            args.id
        );
    }
    let component = handle.component(kind, args.id)?;
    Ok((handle, component))
}

fn registers<'a>(
    component: &'a Component,
    args: &ComponentArgs,
) -> Result<&'a Registers, Box<dyn std::error::Error>> {
    component
        .registers()
        .ok_or_else(|| format!("{} has no registers", args.component).into())
}

fn named_registers(
    component: &Component,
    args: &ComponentArgs,
) -> Result<NamedRegisters, Box<dyn std::error::Error>> {
    let map = match &args.map {
        Some(path) => RegisterMap::load_file(path)?,
        None => RegisterMap::new(),
    };
    component
        .named_registers(Arc::new(map))
        .ok_or_else(|| format!("{} has no registers", args.component).into())
}

/// Read `count` registers starting at `register`
pub fn run_read_register(
    args: &ComponentArgs,
    db: &BoardDatabase,
    register: &str,
    count: usize,
) -> CmdResult {
    let (_handle, component) = open_component(args, db)?;
    let named = named_registers(&component, args)?;

    if count <= 1 {
        let value = named.read(register)?;
        println!("{}: {:#x}", register, value);
        return Ok(());
    }

    let (address, _) = named.map().resolve(register)?;
    let mut values = vec![0u32; count];
    named.read_burst(register, &mut values)?;
    let digits = named.registers().layout().value.bytes() * 2;
    for (offset, value) in values.iter().enumerate() {
        let address = address + offset as u32;
        println!(
            "{:#06x} {:<20} {:#0width$x}",
            address,
            named.map().name_of(address).unwrap_or(""),
            value,
            width = digits + 2
        );
    }
    Ok(())
}

/// Write one register or bit field
pub fn run_write_register(
    args: &ComponentArgs,
    db: &BoardDatabase,
    register: &str,
    value: u32,
) -> CmdResult {
    let (_handle, component) = open_component(args, db)?;
    named_registers(&component, args)?.write(register, value)?;
    println!("Wrote {:#x} to {} {}", value, args.component, register);
    Ok(())
}

/// Set bits in one register
///
/// Radars with a command protocol get a single set-bits command; other
/// components fall back to a register modify.
pub fn run_set_bits(args: &ComponentArgs, db: &BoardDatabase, address: u32, mask: u32) -> CmdResult {
    let (_handle, component) = open_component(args, db)?;
    match component.protocol() {
        Some(protocol) => {
            let address = u8::try_from(address)
                .map_err(|_| format!("Protocol register address {:#x} out of range", address))?;
            protocol.set_bits(address, mask)?;
        }
        None => registers(&component, args)?.set_bits(address, mask)?,
    }
    println!("Set bits {:#x} in {} register {:#x}", mask, args.component, address);
    Ok(())
}
