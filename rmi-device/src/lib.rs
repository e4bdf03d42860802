//! RMI4 device interface
//!
//! This crate provides function discovery (Page Description Table scan),
//! F01 device queries and reset on top of any transport layer (HID,
//! I2C, SPI, etc.)

pub mod error;
pub mod function;
pub mod properties;
pub mod query;

pub use error::RmiError;
pub use function::{FunctionRecord, PDT_ENTRY_SIZE};
pub use properties::{DateOfManufacture, DeviceProperties};

// Re-export transport types used in this crate's API
pub use rmi_transport::{
    AttentionCopy, AttentionReport, AttentionWait, BoxedTransport, Transport, TransportError,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::function::number;

/// Page select register offset, present on every page
pub const PAGE_SELECT_REGISTER: u8 = 0xFF;
/// Pages scanned for PDT entries (0..MAX_PAGE)
pub const MAX_PAGE: u8 = 0xFF;
/// First (highest) PDT entry offset within a page
pub const PDT_SCAN_START: u8 = 0xE9;
/// Last (lowest) PDT entry offset within a page
pub const PDT_SCAN_END: u8 = 0x05;

/// F01 command register value requesting a device reset
pub const F01_CMD_DEVICE_RESET: u8 = 0x01;
/// Time the device needs to come back from reset
pub const RESET_DELAY: Duration = Duration::from_millis(100);

/// Sleep for the whole of `duration`, resuming after early wakeups
fn sleep_full(duration: Duration) {
    let deadline = Instant::now() + duration;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining);
    }
}

/// High-level RMI4 device on top of any transport
///
/// Owns the function table and the decoded device properties. Scans,
/// queries and resets take `&mut self`; everything else only reads.
pub struct RmiDevice {
    transport: BoxedTransport,
    functions: Vec<FunctionRecord>,
    properties: Option<DeviceProperties>,
    current_page: u8,
    functions_stale: bool,
}

impl RmiDevice {
    /// Create a device interface over an open transport
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            functions: Vec::new(),
            properties: None,
            current_page: 0,
            functions_stale: false,
        }
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // === Address space ===

    /// Select the register page subsequent accesses target
    pub fn set_rmi_page(&mut self, page: u8) -> Result<(), RmiError> {
        let select_addr = ((self.current_page as u16) << 8) | PAGE_SELECT_REGISTER as u16;
        self.transport.write(select_addr, &[page])?;
        self.current_page = page;
        Ok(())
    }

    /// Page selected by the last [`set_rmi_page`](Self::set_rmi_page)
    pub fn current_page(&self) -> u8 {
        self.current_page
    }

    fn ensure_page(&mut self, page: u8) -> Result<(), RmiError> {
        if self.current_page != page {
            self.set_rmi_page(page)?;
        }
        Ok(())
    }

    /// Select the page holding `addr` unless it is already selected
    pub fn select_page_for(&mut self, addr: u16) -> Result<(), RmiError> {
        self.ensure_page((addr >> 8) as u8)
    }

    // === Function discovery ===

    /// Walk the Page Description Tables and rebuild the function table
    ///
    /// Each page's table is read from the top entry down and ends at the
    /// first entry with function number 0. Tables are contiguous from page
    /// 0, so a page without entries ends the scan. On a read failure the
    /// table is left empty and the error returned.
    pub fn scan_pdt(&mut self) -> Result<&[FunctionRecord], RmiError> {
        self.functions.clear();
        self.functions_stale = false;

        if let Err(e) = self.scan_pages() {
            self.functions.clear();
            return Err(e);
        }

        info!("PDT scan found {} functions", self.functions.len());
        Ok(&self.functions)
    }

    fn scan_pages(&mut self) -> Result<(), RmiError> {
        let mut interrupt_count = 0u32;

        for page in 0..MAX_PAGE {
            self.set_rmi_page(page)?;
            let page_base = (page as u16) << 8;
            let mut found = false;

            for offset in (PDT_SCAN_END..=PDT_SCAN_START)
                .rev()
                .step_by(PDT_ENTRY_SIZE)
            {
                let addr = page_base | offset as u16;
                let mut entry = [0u8; PDT_ENTRY_SIZE];
                self.transport.read(addr, &mut entry).map_err(|e| {
                    debug!("Failed to read PDT entry at 0x{:04X}: {}", addr, e);
                    e
                })?;

                let function = FunctionRecord::from_pdt_entry(&entry, page, interrupt_count);
                if function.number() == 0 {
                    break;
                }

                debug!(
                    "F{:02X} at 0x{:04X}: query 0x{:04X} cmd 0x{:04X} ctrl 0x{:04X} data 0x{:04X}, {} irq",
                    function.number(),
                    addr,
                    function.query_base(),
                    function.command_base(),
                    function.control_base(),
                    function.data_base(),
                    function.interrupt_source_count()
                );
                interrupt_count += function.interrupt_source_count() as u32;
                self.functions.push(function);
                found = true;
            }

            if !found {
                break;
            }
        }

        Ok(())
    }

    /// Functions found by the last scan, in discovery order
    pub fn functions(&self) -> &[FunctionRecord] {
        &self.functions
    }

    /// Look up a function by number
    pub fn get_function(&self, number: u8) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.number() == number)
    }

    /// Whether a reset happened since the last scan
    pub fn is_function_table_stale(&self) -> bool {
        self.functions_stale
    }

    /// Total interrupt sources across all discovered functions
    pub fn interrupt_source_count(&self) -> u32 {
        self.functions
            .iter()
            .map(|f| f.interrupt_source_count() as u32)
            .sum()
    }

    fn f01(&self) -> Result<FunctionRecord, RmiError> {
        self.get_function(number::F01)
            .copied()
            .ok_or(RmiError::FunctionNotFound(number::F01))
    }

    // === Device control ===

    /// Read F01's query registers
    ///
    /// Properties from an earlier query are dropped first, so after a
    /// failure [`properties`](Self::properties) returns `None`.
    pub fn query_basic_properties(&mut self) -> Result<&DeviceProperties, RmiError> {
        self.properties = None;
        let f01 = self.f01()?;
        self.ensure_page(f01.page())?;

        let props = query::read_basic_properties(self.transport.as_ref(), &f01)?;
        Ok(self.properties.insert(props))
    }

    /// Properties from the last successful query
    pub fn properties(&self) -> Option<&DeviceProperties> {
        self.properties.as_ref()
    }

    /// Reset the device through F01's command register
    ///
    /// Blocks for the full reset delay. The function table is marked stale;
    /// rescanning is up to the caller.
    pub fn reset(&mut self) -> Result<(), RmiError> {
        let f01 = self.f01()?;
        self.ensure_page(f01.page())?;

        info!("Resetting device");
        self.transport
            .write(f01.command_base(), &[F01_CMD_DEVICE_RESET])?;
        sleep_full(RESET_DELAY);

        // Page select returns to 0 on reset
        self.current_page = 0;
        self.functions_stale = true;
        info!("Reset completed");
        Ok(())
    }

    // === Register access ===
    //
    // Addresses go to the transport as given; callers select the page
    // first (see `select_page_for`).

    pub fn read(&self, addr: u16, buf: &mut [u8]) -> Result<usize, RmiError> {
        Ok(self.transport.read(addr, buf)?)
    }

    pub fn write(&self, addr: u16, data: &[u8]) -> Result<usize, RmiError> {
        Ok(self.transport.write(addr, data)?)
    }

    // === Attention ===

    /// See [`Transport::wait_for_attention`]
    pub fn wait_for_attention(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
    ) -> Result<AttentionWait<AttentionReport>, RmiError> {
        Ok(self.transport.wait_for_attention(timeout, source_mask)?)
    }

    /// See [`Transport::get_attention_report`]
    pub fn get_attention_report(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
        buf: &mut [u8],
    ) -> Result<AttentionWait<AttentionCopy>, RmiError> {
        Ok(self
            .transport
            .get_attention_report(timeout, source_mask, buf)?)
    }
}
