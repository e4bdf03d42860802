//! RMI4 function records decoded from Page Description Table entries

use serde::Serialize;

/// Size of one PDT entry in bytes
pub const PDT_ENTRY_SIZE: usize = 6;

mod entry {
    pub const QUERY_BASE: usize = 0;
    pub const COMMAND_BASE: usize = 1;
    pub const CONTROL_BASE: usize = 2;
    pub const DATA_BASE: usize = 3;
    pub const INTERRUPT_INFO: usize = 4;
    pub const FUNCTION_NUMBER: usize = 5;

    pub const INTERRUPT_COUNT_MASK: u8 = 0x07;
    pub const VERSION_SHIFT: u8 = 5;
    pub const VERSION_MASK: u8 = 0x03;
}

/// Well-known function numbers
pub mod number {
    /// Device control
    pub const F01: u8 = 0x01;
    /// 2D sensing (touch position)
    pub const F11: u8 = 0x11;
    /// 2D sensing, newer layout
    pub const F12: u8 = 0x12;
    /// Firmware flash (v5)
    pub const F34: u8 = 0x34;
    /// Test reporting
    pub const F54: u8 = 0x54;

    /// Human-readable name for a function number
    pub fn name(number: u8) -> &'static str {
        match number {
            F01 => "Device Control",
            F11 | F12 => "2D Sensor",
            F34 => "Flash Memory",
            F54 => "Test Reporting",
            _ => "Unknown",
        }
    }
}

/// One function discovered during a PDT scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    number: u8,
    page: u8,
    query_base: u16,
    command_base: u16,
    control_base: u16,
    data_base: u16,
    interrupt_source_count: u8,
    interrupt_offset: u32,
    version: u8,
}

impl FunctionRecord {
    /// Decode a PDT entry read from `page`
    ///
    /// `interrupt_offset` is the number of interrupt sources claimed by the
    /// functions discovered before this one.
    pub fn from_pdt_entry(entry: &[u8; PDT_ENTRY_SIZE], page: u8, interrupt_offset: u32) -> Self {
        let page_base = (page as u16) << 8;
        Self {
            number: entry[entry::FUNCTION_NUMBER],
            page,
            query_base: page_base | entry[entry::QUERY_BASE] as u16,
            command_base: page_base | entry[entry::COMMAND_BASE] as u16,
            control_base: page_base | entry[entry::CONTROL_BASE] as u16,
            data_base: page_base | entry[entry::DATA_BASE] as u16,
            interrupt_source_count: entry[entry::INTERRUPT_INFO] & entry::INTERRUPT_COUNT_MASK,
            interrupt_offset,
            version: (entry[entry::INTERRUPT_INFO] >> entry::VERSION_SHIFT) & entry::VERSION_MASK,
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Page the function's registers live on
    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn query_base(&self) -> u16 {
        self.query_base
    }

    pub fn command_base(&self) -> u16 {
        self.command_base
    }

    pub fn control_base(&self) -> u16 {
        self.control_base
    }

    pub fn data_base(&self) -> u16 {
        self.data_base
    }

    pub fn interrupt_source_count(&self) -> u8 {
        self.interrupt_source_count
    }

    /// Index of this function's first interrupt source in the device bitmap
    pub fn interrupt_offset(&self) -> u32 {
        self.interrupt_offset
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Interrupt status register holding this function's first source
    pub fn interrupt_register(&self) -> u32 {
        self.interrupt_offset / 8
    }

    /// Bits of this function's sources within [`interrupt_register`](Self::interrupt_register)
    ///
    /// Sources spilling into the next register are not included.
    pub fn interrupt_mask(&self) -> u8 {
        let shift = self.interrupt_offset % 8;
        let bits = ((1u32 << self.interrupt_source_count) - 1) << shift;
        (bits & 0xFF) as u8
    }

    /// Mask of this function's sources in a device-wide source bitmap
    pub fn source_mask(&self) -> u32 {
        let bits = (1u64 << self.interrupt_source_count) - 1;
        (bits << self.interrupt_offset.min(63)) as u32
    }
}
