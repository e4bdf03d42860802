//! Command handlers for the CLI application.
//!
//! - `query`: function table and F01 properties (info, reset)
//! - `register`: raw register access (read, write)
//! - `attention`: attention report monitor (attn)

pub mod attention;
pub mod query;
pub mod register;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rmi_device::RmiDevice;
use rmi_transport::{HidTransport, HidTransportConfig};
use serde::Serialize;

use crate::cli::Cli;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Open the hidraw node named on the command line and scan its functions
pub fn open_device(cli: &Cli) -> anyhow::Result<RmiDevice> {
    let config = HidTransportConfig::default()
        .with_mode(cli.mode.into())
        .with_bytes_per_read_request(cli.read_chunk)
        .with_read_timeout(Duration::from_millis(cli.read_timeout_ms));

    let transport = HidTransport::open(&cli.device, config)
        .with_context(|| format!("Failed to open {}", cli.device))?;

    let mut device = RmiDevice::new(Arc::new(transport));
    device.scan_pdt().context("PDT scan failed")?;
    Ok(device)
}

/// Print one JSON document on stdout
pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format bytes as a hex dump, 16 per line
pub fn hex_dump(addr: u16, data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(i, line)| {
            let bytes: Vec<String> = line.iter().map(|b| format!("{b:02X}")).collect();
            format!(
                "{:04X}: {}",
                addr.wrapping_add((i * 16) as u16),
                bytes.join(" ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
