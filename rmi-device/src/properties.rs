//! Device identity and capabilities reported by function 0x01

use std::fmt;

use serde::Serialize;

/// Length of the fixed F01 basic query block
pub const BASIC_QUERY_LEN: usize = 21;
/// Length of the product ID field
pub const PRODUCT_ID_LEN: usize = 10;
/// Offset of the product ID within the basic query block
pub const PRODUCT_ID_OFFSET: usize = 11;

pub const PACKAGE_ID_LEN: usize = 4;
pub const BUILD_ID_LEN: usize = 3;

/// Query 1 capability bits
pub mod query1 {
    pub const HAS_LTS: u8 = 1 << 2;
    pub const HAS_SENSOR_ID: u8 = 1 << 3;
    pub const HAS_CHARGER_INPUT: u8 = 1 << 4;
    pub const HAS_ADJUSTABLE_DOZE: u8 = 1 << 5;
    pub const HAS_ADJUSTABLE_DOZE_HOLDOFF: u8 = 1 << 6;
    pub const HAS_QUERY42: u8 = 1 << 7;
}

/// Query 42 capability bits
pub mod query42 {
    pub const HAS_DS4_QUERIES: u8 = 1 << 0;
    pub const HAS_MULTI_PHYSICAL: u8 = 1 << 1;
}

/// Query 43 (DS4 byte 1) capability bits
pub mod query43 {
    pub const HAS_PACKAGE_ID_QUERY: u8 = 1 << 0;
    pub const HAS_BUILD_ID_QUERY: u8 = 1 << 1;
}

const PRODUCT_INFO_MASK: u8 = 0x7F;
const YEAR_MASK: u8 = 0x1F;
const MONTH_MASK: u8 = 0x0F;
const DAY_MASK: u8 = 0x1F;

/// Date of manufacture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateOfManufacture {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl DateOfManufacture {
    /// Build from the raw 5/4/5-bit query fields (year counts from 2000)
    pub fn from_raw(year: u8, month: u8, day: u8) -> Self {
        Self {
            year: 2000 + (year & YEAR_MASK) as u16,
            month: month & MONTH_MASK,
            day: day & DAY_MASK,
        }
    }
}

impl fmt::Display for DateOfManufacture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Decode package ID and revision (two little-endian u16)
pub fn decode_package_id(bytes: &[u8; PACKAGE_ID_LEN]) -> (u16, u16) {
    (
        u16::from_le_bytes([bytes[0], bytes[1]]),
        u16::from_le_bytes([bytes[2], bytes[3]]),
    )
}

/// Decode the 24-bit little-endian build ID
pub fn decode_build_id(bytes: &[u8; BUILD_ID_LEN]) -> u32 {
    u16::from_le_bytes([bytes[0], bytes[1]]) as u32 + bytes[2] as u32 * 65536
}

/// Merge the two 7-bit product info fields
pub fn decode_product_info(hi: u8, lo: u8) -> u16 {
    (((hi & PRODUCT_INFO_MASK) as u16) << 7) | (lo & PRODUCT_INFO_MASK) as u16
}

/// Product ID string, up to the first NUL
pub fn decode_product_id(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Identity and capabilities decoded from the F01 query registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceProperties {
    pub(crate) manufacturer_id: u8,
    pub(crate) product_id: String,
    pub(crate) product_info: u16,
    pub(crate) date_of_manufacture: DateOfManufacture,
    pub(crate) sensor_id: Option<u8>,
    pub(crate) package_id: Option<u16>,
    pub(crate) package_revision: Option<u16>,
    pub(crate) build_id: Option<u32>,
    pub(crate) ds4_query_length: u8,

    pub(crate) has_lts: bool,
    pub(crate) has_sensor_id: bool,
    pub(crate) has_charger_input: bool,
    pub(crate) has_adjustable_doze: bool,
    pub(crate) has_adjustable_doze_holdoff: bool,
    pub(crate) has_query42: bool,
    pub(crate) has_ds4_queries: bool,
    pub(crate) has_multi_physical: bool,
    pub(crate) has_package_id_query: bool,
    pub(crate) has_build_id_query: bool,
}

impl DeviceProperties {
    /// Decode the fixed basic query block
    pub fn from_basic_query(query: &[u8; BASIC_QUERY_LEN]) -> Self {
        let flags = query[1];
        Self {
            manufacturer_id: query[0],
            product_id: decode_product_id(
                &query[PRODUCT_ID_OFFSET..PRODUCT_ID_OFFSET + PRODUCT_ID_LEN],
            ),
            product_info: decode_product_info(query[2], query[3]),
            date_of_manufacture: DateOfManufacture::from_raw(query[5], query[6], query[7]),
            has_lts: flags & query1::HAS_LTS != 0,
            has_sensor_id: flags & query1::HAS_SENSOR_ID != 0,
            has_charger_input: flags & query1::HAS_CHARGER_INPUT != 0,
            has_adjustable_doze: flags & query1::HAS_ADJUSTABLE_DOZE != 0,
            has_adjustable_doze_holdoff: flags & query1::HAS_ADJUSTABLE_DOZE_HOLDOFF != 0,
            has_query42: flags & query1::HAS_QUERY42 != 0,
            ..Default::default()
        }
    }

    pub fn manufacturer_id(&self) -> u8 {
        self.manufacturer_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_info(&self) -> u16 {
        self.product_info
    }

    pub fn date_of_manufacture(&self) -> DateOfManufacture {
        self.date_of_manufacture
    }

    pub fn sensor_id(&self) -> Option<u8> {
        self.sensor_id
    }

    pub fn package_id(&self) -> Option<u16> {
        self.package_id
    }

    pub fn package_revision(&self) -> Option<u16> {
        self.package_revision
    }

    pub fn build_id(&self) -> Option<u32> {
        self.build_id
    }

    /// Number of DS4 query bytes the device advertises
    pub fn ds4_query_length(&self) -> u8 {
        self.ds4_query_length
    }

    pub fn has_lts(&self) -> bool {
        self.has_lts
    }

    pub fn has_sensor_id(&self) -> bool {
        self.has_sensor_id
    }

    pub fn has_charger_input(&self) -> bool {
        self.has_charger_input
    }

    pub fn has_adjustable_doze(&self) -> bool {
        self.has_adjustable_doze
    }

    pub fn has_adjustable_doze_holdoff(&self) -> bool {
        self.has_adjustable_doze_holdoff
    }

    pub fn has_query42(&self) -> bool {
        self.has_query42
    }

    pub fn has_ds4_queries(&self) -> bool {
        self.has_ds4_queries
    }

    pub fn has_multi_physical(&self) -> bool {
        self.has_multi_physical
    }

    pub fn has_package_id_query(&self) -> bool {
        self.has_package_id_query
    }

    pub fn has_build_id_query(&self) -> bool {
        self.has_build_id_query
    }
}
