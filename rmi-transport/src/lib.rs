//! Transport abstraction layer for RMI4 register access
//!
//! RMI4 touch controllers expose a page-addressed 16-bit register space and
//! signal interrupts through attention notifications. This crate provides a
//! unified interface for both, across transport backends:
//!
//! - HID (hidraw, RMI tunneled through vendor reports)
//! - I2C / SPI (future, same interface)

pub mod attention;
pub mod descriptor;
pub mod error;
pub mod protocol;
pub mod reader;
pub mod types;

mod hid;

pub use attention::{AttentionQueue, ATTN_QUEUE_CAPACITY};
pub use descriptor::parse_report_sizes;
pub use error::TransportError;
pub use hid::{HidTransport, HidTransportConfig, ReportSink};
pub use types::{
    AttentionCopy, AttentionReport, AttentionWait, ReportMode, ReportSizes, TransportDeviceInfo,
};

use std::sync::Arc;
use std::time::Duration;

/// Source mask accepting attention from every interrupt source
pub const ALL_SOURCES: u32 = u32::MAX;

/// The core transport trait - all backends implement this
///
/// Register transactions are strict request/response: implementations
/// serialize them internally, so only one is ever in flight. Attention
/// waits may run concurrently with register access and with `cancel()`.
pub trait Transport: Send + Sync {
    /// Read `buf.len()` bytes starting at `addr`
    ///
    /// Fails on a short transfer; returns the number of bytes read.
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data` starting at `addr`
    fn write(&self, addr: u16, data: &[u8]) -> Result<usize, TransportError>;

    /// Select the device reporting mode
    fn set_mode(&self, mode: ReportMode) -> Result<(), TransportError>;

    /// Block until an attention report matching `source_mask` is available
    ///
    /// # Arguments
    /// * `timeout` - `None` blocks indefinitely, `Some(Duration::ZERO)` polls
    /// * `source_mask` - interrupt sources of interest ([`ALL_SOURCES`] for any)
    ///
    /// Timeout and cancellation are returned as [`AttentionWait`] variants.
    fn wait_for_attention(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
    ) -> Result<AttentionWait<AttentionReport>, TransportError>;

    /// Wait like [`wait_for_attention`](Self::wait_for_attention) and copy
    /// the report payload into `buf`
    ///
    /// If `buf` is too small nothing is copied and the returned length is 0;
    /// the interrupt sources are still reported.
    fn get_attention_report(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
        buf: &mut [u8],
    ) -> Result<AttentionWait<AttentionCopy>, TransportError> {
        Ok(self
            .wait_for_attention(timeout, source_mask)?
            .map(|report| {
                let len = match buf.get_mut(..report.data.len()) {
                    Some(dst) => {
                        dst.copy_from_slice(&report.data);
                        report.data.len()
                    }
                    None => 0,
                };
                AttentionCopy {
                    sources: report.sources,
                    len,
                }
            }))
    }

    /// Make pending and future attention waits return `Canceled`
    ///
    /// Idempotent and callable from any thread. Stays in effect until the
    /// transport is closed.
    fn cancel(&self);

    /// Release the device; safe to call more than once
    fn close(&self);

    /// Whether the transport is open
    fn is_open(&self) -> bool;

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;
