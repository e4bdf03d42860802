//! Common types for transport layer

use serde::Serialize;

/// Device reporting mode selected through the set-mode feature report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ReportMode {
    /// Device emulates a HID mouse, no attention reports
    Mouse,
    /// Attention reports with packed data
    #[default]
    AttentionReports,
    /// Attention reports without packed data
    NoPackedAttentionReports,
}

impl ReportMode {
    /// Wire value sent in the set-mode feature report
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Mouse => 0,
            Self::AttentionReports => 1,
            Self::NoPackedAttentionReports => 2,
        }
    }

    /// Parse a wire value
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Mouse),
            1 => Some(Self::AttentionReports),
            2 => Some(Self::NoPackedAttentionReports),
            _ => None,
        }
    }
}

/// One attention report as delivered by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttentionReport {
    /// Interrupt source bitmap
    pub sources: u32,
    /// Report payload following the attention header
    pub data: Vec<u8>,
}

impl AttentionReport {
    pub fn new(sources: u32, data: Vec<u8>) -> Self {
        Self { sources, data }
    }

    /// Whether any of the sources in `mask` raised this report
    pub fn matches(&self, mask: u32) -> bool {
        self.sources & mask != 0
    }
}

/// Outcome of waiting for attention
///
/// Timeout and cancellation are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttentionWait<T> {
    /// A report arrived
    Ready(T),
    /// The timeout elapsed with nothing queued
    TimedOut,
    /// `cancel()` was called on the transport
    Canceled,
}

impl<T> AttentionWait<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> AttentionWait<U> {
        match self {
            Self::Ready(v) => AttentionWait::Ready(f(v)),
            Self::TimedOut => AttentionWait::TimedOut,
            Self::Canceled => AttentionWait::Canceled,
        }
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Result of copying an attention report into a caller buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionCopy {
    /// Interrupt source bitmap of the report
    pub sources: u32,
    /// Bytes copied, 0 if the buffer was too small
    pub len: usize,
}

/// Device identification information
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransportDeviceInfo {
    /// USB/I2C-HID vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
    /// Device path (hidraw node)
    pub device_path: String,
    /// Product name if available
    pub product_name: Option<String>,
}

/// Report lengths in bytes (including the report ID byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSizes {
    pub input: usize,
    pub output: usize,
    pub feature: usize,
}
