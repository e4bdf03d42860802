//! HID report descriptor parsing
//!
//! Only as much of the descriptor grammar as is needed to size the RMI
//! reports: Report ID / Report Size / Report Count globals (with Push/Pop)
//! and the Input / Output / Feature main items. Everything else is skipped.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::TransportError;
use crate::protocol::report_id;
use crate::types::ReportSizes;

/// Largest descriptor hidraw will hand out
pub const MAX_DESCRIPTOR_SIZE: usize = 4096;

const LONG_ITEM_PREFIX: u8 = 0xFE;

mod item_type {
    pub const MAIN: u8 = 0;
    pub const GLOBAL: u8 = 1;
}

mod main_tag {
    pub const INPUT: u8 = 0x8;
    pub const OUTPUT: u8 = 0x9;
    pub const FEATURE: u8 = 0xB;
}

mod global_tag {
    pub const REPORT_SIZE: u8 = 0x7;
    pub const REPORT_ID: u8 = 0x8;
    pub const REPORT_COUNT: u8 = 0x9;
    pub const PUSH: u8 = 0xA;
    pub const POP: u8 = 0xB;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ReportKind {
    Input,
    Output,
    Feature,
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Total data bits declared per (kind, report ID)
fn report_bits(desc: &[u8]) -> Result<BTreeMap<(ReportKind, u8), u64>, TransportError> {
    let mut bits = BTreeMap::new();
    let mut globals = Globals::default();
    let mut stack: Vec<Globals> = Vec::new();
    let mut i = 0;

    while i < desc.len() {
        let prefix = desc[i];

        if prefix == LONG_ITEM_PREFIX {
            let data_len = *desc.get(i + 1).ok_or_else(|| {
                TransportError::InvalidDescriptor(format!("truncated long item at {}", i))
            })? as usize;
            i += 3 + data_len;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let data = desc.get(i + 1..i + 1 + size).ok_or_else(|| {
            TransportError::InvalidDescriptor(format!("truncated item 0x{:02X} at {}", prefix, i))
        })?;
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        let kind = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;

        match (kind, tag) {
            (item_type::MAIN, main_tag::INPUT | main_tag::OUTPUT | main_tag::FEATURE) => {
                let report_kind = match tag {
                    main_tag::INPUT => ReportKind::Input,
                    main_tag::OUTPUT => ReportKind::Output,
                    _ => ReportKind::Feature,
                };
                *bits.entry((report_kind, globals.report_id)).or_insert(0) +=
                    globals.report_size as u64 * globals.report_count as u64;
            }
            (item_type::GLOBAL, global_tag::REPORT_SIZE) => globals.report_size = value,
            (item_type::GLOBAL, global_tag::REPORT_ID) => globals.report_id = value as u8,
            (item_type::GLOBAL, global_tag::REPORT_COUNT) => globals.report_count = value,
            (item_type::GLOBAL, global_tag::PUSH) => stack.push(globals),
            (item_type::GLOBAL, global_tag::POP) => {
                globals = stack.pop().ok_or_else(|| {
                    TransportError::InvalidDescriptor(format!("pop without push at {}", i))
                })?;
            }
            _ => {}
        }

        i += 1 + size;
    }

    Ok(bits)
}

fn report_len(bits: &BTreeMap<(ReportKind, u8), u64>, kind: ReportKind, ids: &[u8]) -> usize {
    ids.iter()
        .filter_map(|id| bits.get(&(kind, *id)).map(|b| (*id, *b)))
        .map(|(id, b)| {
            let data = b.div_ceil(8) as usize;
            if id == 0 {
                data
            } else {
                data + 1
            }
        })
        .max()
        .unwrap_or(0)
}

/// Derive RMI report sizes from a raw report descriptor
///
/// Sizes include the leading report ID byte. A device that does not declare
/// both the RMI input and output reports is not an RMI-over-HID device.
pub fn parse_report_sizes(desc: &[u8]) -> Result<ReportSizes, TransportError> {
    let bits = report_bits(desc)?;

    let sizes = ReportSizes {
        input: report_len(
            &bits,
            ReportKind::Input,
            &[report_id::READ_DATA, report_id::ATTN],
        ),
        output: report_len(
            &bits,
            ReportKind::Output,
            &[report_id::WRITE, report_id::READ_ADDR],
        ),
        feature: report_len(&bits, ReportKind::Feature, &[report_id::SET_RMI_MODE]),
    };
    debug!("Report sizes from descriptor: {:?}", sizes);

    if sizes.input == 0 || sizes.output == 0 {
        return Err(TransportError::InvalidDescriptor(format!(
            "no RMI input/output reports (input={}, output={})",
            sizes.input, sizes.output
        )));
    }

    Ok(sizes)
}
