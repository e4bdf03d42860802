//! HID framing for RMI4 register access
//!
//! RMI over HID tunnels register transactions through vendor reports:
//!
//! ```text
//! write      (output)  [09, len, addr_lo, addr_hi, data...]
//! read addr  (output)  [0A, 00, addr_lo, addr_hi, len_lo, len_hi]
//! read data  (input)   [0B, count, data...]
//! attention  (input)   [0C, sources, data...]
//! set mode   (feature) [0F, mode]
//! ```
//!
//! Reports are padded with zeros to the size the device declares in its
//! report descriptor.

use crate::error::TransportError;
use crate::types::{AttentionReport, ReportMode};

/// Report ID constants
pub mod report_id {
    pub const WRITE: u8 = 0x09;
    pub const READ_ADDR: u8 = 0x0A;
    pub const READ_DATA: u8 = 0x0B;
    pub const ATTN: u8 = 0x0C;
    pub const SET_RMI_MODE: u8 = 0x0F;

    /// Get human-readable name for report ID
    pub fn name(id: u8) -> &'static str {
        match id {
            WRITE => "WRITE",
            READ_ADDR => "READ_ADDR",
            READ_DATA => "READ_DATA",
            ATTN => "ATTN",
            SET_RMI_MODE => "SET_RMI_MODE",
            _ => "UNKNOWN",
        }
    }
}

/// Timing constants
pub mod timing {
    /// Times a read request is re-sent after an incomplete response
    pub const READ_RETRIES: usize = 3;
    /// Default wait for each read-data report (ms)
    pub const READ_TIMEOUT_MS: u64 = 200;
    /// Reader thread poll interval, bounds shutdown latency (ms)
    pub const READER_POLL_MS: i32 = 5;
    /// Reader thread back-off after a device error (ms)
    pub const READER_ERROR_SLEEP_MS: u64 = 100;
}

/// Header length of a write report
pub const WRITE_HEADER_LEN: usize = 4;
/// Length of a read-address request
pub const READ_REQUEST_LEN: usize = 6;
/// Header length of a read-data report
pub const READ_DATA_HEADER_LEN: usize = 2;
/// Header length of an attention report
pub const ATTN_HEADER_LEN: usize = 2;

/// Largest payload a single write report of `output_size` bytes can carry
pub fn max_write_payload(output_size: usize) -> usize {
    output_size.saturating_sub(WRITE_HEADER_LEN).min(u8::MAX as usize)
}

/// Build a register write report
pub fn build_write_report(
    addr: u16,
    data: &[u8],
    output_size: usize,
) -> Result<Vec<u8>, TransportError> {
    let max = max_write_payload(output_size);
    if data.len() > max {
        return Err(TransportError::InvalidReport(format!(
            "write of {} bytes exceeds report capacity {}",
            data.len(),
            max
        )));
    }

    let mut buf = vec![0u8; output_size.max(WRITE_HEADER_LEN + data.len())];
    buf[0] = report_id::WRITE;
    buf[1] = data.len() as u8;
    buf[2..4].copy_from_slice(&addr.to_le_bytes());
    buf[WRITE_HEADER_LEN..WRITE_HEADER_LEN + data.len()].copy_from_slice(data);
    Ok(buf)
}

/// Build a register read request
pub fn build_read_request(addr: u16, len: u16, output_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; output_size.max(READ_REQUEST_LEN)];
    buf[0] = report_id::READ_ADDR;
    buf[2..4].copy_from_slice(&addr.to_le_bytes());
    buf[4..6].copy_from_slice(&len.to_le_bytes());
    buf
}

/// Build the set-mode feature report
pub fn build_set_mode(mode: ReportMode, feature_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; feature_size.max(2)];
    buf[0] = report_id::SET_RMI_MODE;
    buf[1] = mode.as_byte();
    buf
}

/// A classified input report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReport<'a> {
    /// Payload of a read-data response
    ReadData(&'a [u8]),
    /// Attention notification
    Attention(AttentionReport),
    /// Too short for its report ID
    Malformed,
    /// Report ID this stack does not handle (e.g. mouse reports)
    Other(u8),
}

/// Classify a raw input report (report ID in byte 0)
pub fn parse_input_report(report: &[u8]) -> InputReport<'_> {
    let Some(&id) = report.first() else {
        return InputReport::Malformed;
    };

    match id {
        report_id::READ_DATA => {
            if report.len() < READ_DATA_HEADER_LEN {
                return InputReport::Malformed;
            }
            let available = report.len() - READ_DATA_HEADER_LEN;
            let count = (report[1] as usize).min(available);
            InputReport::ReadData(&report[READ_DATA_HEADER_LEN..READ_DATA_HEADER_LEN + count])
        }
        report_id::ATTN => {
            if report.len() < ATTN_HEADER_LEN {
                return InputReport::Malformed;
            }
            InputReport::Attention(AttentionReport::new(
                report[1] as u32,
                report[ATTN_HEADER_LEN..].to_vec(),
            ))
        }
        other => InputReport::Other(other),
    }
}
