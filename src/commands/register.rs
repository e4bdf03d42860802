//! Raw register commands

use anyhow::Context;
use rmi_device::RmiDevice;

use super::{hex_dump, print_json, CommandResult};

pub fn read(device: &mut RmiDevice, addr: u16, len: usize, json: bool) -> CommandResult {
    device
        .select_page_for(addr)
        .with_context(|| format!("Failed to select page 0x{:02X}", addr >> 8))?;
    let mut buf = vec![0u8; len];
    device
        .read(addr, &mut buf)
        .with_context(|| format!("Read of {len} bytes at 0x{addr:04X} failed"))?;

    if json {
        return print_json(&serde_json::json!({ "addr": addr, "data": buf }));
    }
    println!("{}", hex_dump(addr, &buf));
    Ok(())
}

pub fn write(device: &mut RmiDevice, addr: u16, data: &[u8], json: bool) -> CommandResult {
    device
        .select_page_for(addr)
        .with_context(|| format!("Failed to select page 0x{:02X}", addr >> 8))?;
    let written = device
        .write(addr, data)
        .with_context(|| format!("Write at 0x{addr:04X} failed"))?;

    if json {
        return print_json(&serde_json::json!({ "addr": addr, "written": written }));
    }
    println!("Wrote {written} bytes at 0x{addr:04X}");
    Ok(())
}
