//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Transport is not open")]
    NotOpen,

    #[error("Short read at 0x{addr:04X}: expected {expected} bytes, got {actual}")]
    ShortRead {
        addr: u16,
        expected: usize,
        actual: usize,
    },

    #[error("Short write at 0x{addr:04X}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        addr: u16,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid report descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid report: {0}")]
    InvalidReport(String),

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") || msg.contains("EACCES") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
