//! Attention report monitor

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rmi_device::{AttentionWait, RmiDevice, RmiError};
use rmi_transport::AttentionReport;
use tracing::{debug, info};

use super::CommandResult;

/// Source mask for the `--function` filter, or the raw mask
fn resolve_mask(device: &RmiDevice, mask: u32, function: Option<u8>) -> anyhow::Result<u32> {
    match function {
        Some(number) => device
            .get_function(number)
            .map(|f| f.source_mask())
            .ok_or(RmiError::FunctionNotFound(number))
            .context("Cannot filter attention by function"),
        None => Ok(mask),
    }
}

fn print_report(report: &AttentionReport, json: bool) -> CommandResult {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        let bytes: Vec<String> = report.data.iter().map(|b| format!("{b:02X}")).collect();
        println!("[0x{:08X}] {}", report.sources, bytes.join(" "));
    }
    Ok(())
}

/// Print attention reports until the count is reached, a wait times out,
/// or Ctrl+C cancels the transport
pub fn watch(
    device: &RmiDevice,
    mask: u32,
    function: Option<u8>,
    count: Option<usize>,
    timeout_ms: Option<u64>,
    json: bool,
) -> CommandResult {
    let mask = resolve_mask(device, mask, function)?;
    let timeout = timeout_ms.map(Duration::from_millis);

    let transport = Arc::clone(device.transport());
    ctrlc::set_handler(move || {
        transport.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    info!("Waiting for attention (mask 0x{:08X})", mask);
    let mut received = 0usize;
    while count.map_or(true, |n| received < n) {
        match device.wait_for_attention(timeout, mask)? {
            AttentionWait::Ready(report) => {
                print_report(&report, json)?;
                received += 1;
            }
            AttentionWait::TimedOut => {
                info!("No attention within {:?}", timeout.unwrap_or_default());
                break;
            }
            AttentionWait::Canceled => {
                debug!("Attention wait canceled");
                break;
            }
        }
    }

    info!("Received {} attention reports", received);
    Ok(())
}
