//! Function table and F01 property commands

use anyhow::Context;
use rmi_device::function::number;
use rmi_device::{DeviceProperties, FunctionRecord, RmiDevice};
use rmi_transport::TransportDeviceInfo;
use serde::Serialize;
use tracing::info;

use super::{print_json, CommandResult};

#[derive(Serialize)]
struct InfoReport<'a> {
    device: &'a TransportDeviceInfo,
    interrupt_sources: u32,
    functions: &'a [FunctionRecord],
    properties: &'a DeviceProperties,
}

fn print_functions(functions: &[FunctionRecord]) {
    println!("Functions:");
    for f in functions {
        println!(
            "  F{:02X} {:<14} v{} page {}: query 0x{:04X} cmd 0x{:04X} ctrl 0x{:04X} data 0x{:04X}, irq {} @ {}",
            f.number(),
            number::name(f.number()),
            f.version(),
            f.page(),
            f.query_base(),
            f.command_base(),
            f.control_base(),
            f.data_base(),
            f.interrupt_source_count(),
            f.interrupt_offset()
        );
    }
}

fn print_properties(props: &DeviceProperties) {
    println!("Product ID:        {}", props.product_id());
    println!("Manufacturer ID:   {}", props.manufacturer_id());
    println!("Product info:      0x{:04X}", props.product_info());
    println!("Manufactured:      {}", props.date_of_manufacture());
    if let Some(id) = props.sensor_id() {
        println!("Sensor ID:         {id}");
    }
    if let (Some(id), Some(rev)) = (props.package_id(), props.package_revision()) {
        println!("Package:           {id} rev {rev}");
    }
    if let Some(build) = props.build_id() {
        println!("Build ID:          {build}");
    }
    println!(
        "Capabilities:      lts={} charger={} doze={} doze_holdoff={} multi_physical={}",
        props.has_lts(),
        props.has_charger_input(),
        props.has_adjustable_doze(),
        props.has_adjustable_doze_holdoff(),
        props.has_multi_physical()
    );
}

/// Print the function table and F01 properties
pub fn info(device: &mut RmiDevice, json: bool) -> CommandResult {
    device
        .query_basic_properties()
        .context("Failed to query F01")?;
    let props = device
        .properties()
        .context("F01 properties missing after query")?;
    let transport_info = device.transport().device_info();

    if json {
        return print_json(&InfoReport {
            device: transport_info,
            interrupt_sources: device.interrupt_source_count(),
            functions: device.functions(),
            properties: props,
        });
    }

    println!(
        "Device:            {} ({:04X}:{:04X}) {}",
        transport_info.device_path,
        transport_info.vid,
        transport_info.pid,
        transport_info.product_name.as_deref().unwrap_or("")
    );
    print_properties(props);
    println!("Interrupt sources: {}", device.interrupt_source_count());
    print_functions(device.functions());
    Ok(())
}

/// Reset the device and rebuild the function table
pub fn reset(device: &mut RmiDevice, json: bool) -> CommandResult {
    device.reset().context("Reset failed")?;
    let count = device.scan_pdt().context("Rescan after reset failed")?.len();
    info!("Device back with {} functions", count);

    if json {
        return print_json(&serde_json::json!({
            "reset": true,
            "functions": device.functions(),
        }));
    }
    println!("Reset complete, {count} functions");
    Ok(())
}
