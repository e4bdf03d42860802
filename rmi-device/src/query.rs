//! F01 query register decoding
//!
//! The F01 query space is self-describing: the fixed basic block carries
//! capability flags that decide which optional registers follow it. The
//! decoder walks those registers with a cursor, reading a field only when
//! the flags decoded so far say it is present.
//!
//! ```text
//! query base + 0   basic query (21 bytes, product ID at +11)
//! query base + 17  product info registers (package ID, then build ID)
//! query base + 21  [LTS reserved 1] [sensor ID 1] [LTS block 19]
//!                  [query 42 1] [DS4 length 1] [DS4 bytes N]
//! ```

use rmi_transport::{Transport, TransportError};
use tracing::{debug, warn};

use crate::error::RmiError;
use crate::function::FunctionRecord;
use crate::properties::{
    decode_build_id, decode_package_id, query42, query43, DeviceProperties, BASIC_QUERY_LEN,
    BUILD_ID_LEN, PACKAGE_ID_LEN, PRODUCT_ID_OFFSET,
};

/// Offset from the product ID field to the product info registers
const PRODUCT_INFO_OFFSET: u16 = 6;
/// Reserved register following the basic block when LTS is present
const LTS_RESERVED_LEN: u16 = 1;
/// LTS register block length
const LTS_BLOCK_LEN: u16 = 19;

/// Register cursor over the query space
struct QueryCursor {
    addr: u16,
}

impl QueryCursor {
    fn new(addr: u16) -> Self {
        Self { addr }
    }

    /// Read one register, advancing only on success
    fn read_byte(&mut self, transport: &dyn Transport) -> Result<u8, TransportError> {
        let mut buf = [0u8; 1];
        transport.read(self.addr, &mut buf)?;
        self.addr = self.addr.wrapping_add(1);
        Ok(buf[0])
    }

    fn skip(&mut self, count: u16) {
        self.addr = self.addr.wrapping_add(count);
    }
}

fn fatal(what: &str, e: TransportError) -> RmiError {
    warn!("Failed to read {}: {}", what, e);
    RmiError::Transport(e)
}

/// Decode F01's query registers into [`DeviceProperties`]
///
/// Failures reading the basic block, sensor ID, query 42 or the DS4 length
/// abort the query. Individual DS4 bytes and the package/build ID registers
/// are optional: a failed read is logged and the field left unset.
pub fn read_basic_properties(
    transport: &dyn Transport,
    f01: &FunctionRecord,
) -> Result<DeviceProperties, RmiError> {
    let query_base = f01.query_base();

    let mut basic = [0u8; BASIC_QUERY_LEN];
    transport
        .read(query_base, &mut basic)
        .map_err(|e| fatal("basic query", e))?;
    let mut props = DeviceProperties::from_basic_query(&basic);

    let product_id_addr = query_base.wrapping_add(PRODUCT_ID_OFFSET as u16);
    let mut prod_info_addr = product_id_addr.wrapping_add(PRODUCT_INFO_OFFSET);
    let mut cursor = QueryCursor::new(query_base.wrapping_add(BASIC_QUERY_LEN as u16));

    if props.has_lts {
        cursor.skip(LTS_RESERVED_LEN);
    }

    if props.has_sensor_id {
        let id = cursor
            .read_byte(transport)
            .map_err(|e| fatal("sensor ID", e))?;
        props.sensor_id = Some(id);
    }

    if props.has_lts {
        cursor.skip(LTS_BLOCK_LEN);
    }

    if props.has_query42 {
        let q42 = cursor
            .read_byte(transport)
            .map_err(|e| fatal("query 42", e))?;
        props.has_ds4_queries = q42 & query42::HAS_DS4_QUERIES != 0;
        props.has_multi_physical = q42 & query42::HAS_MULTI_PHYSICAL != 0;
    }

    if props.has_ds4_queries {
        props.ds4_query_length = cursor
            .read_byte(transport)
            .map_err(|e| fatal("DS4 query length", e))?;
    }

    for i in 1..=props.ds4_query_length {
        let value = match cursor.read_byte(transport) {
            Ok(value) => value,
            Err(e) => {
                // Optional register: skip it and keep walking
                warn!("Failed to read F01 query 43.{:02}: {}", i, e);
                cursor.skip(1);
                continue;
            }
        };

        if i == 1 {
            props.has_package_id_query = value & query43::HAS_PACKAGE_ID_QUERY != 0;
            props.has_build_id_query = value & query43::HAS_BUILD_ID_QUERY != 0;
        }
    }

    if props.has_package_id_query {
        let mut buf = [0u8; PACKAGE_ID_LEN];
        match transport.read(prod_info_addr, &mut buf) {
            Ok(_) => {
                let (id, rev) = decode_package_id(&buf);
                props.package_id = Some(id);
                props.package_revision = Some(rev);
            }
            Err(e) => debug!("Package ID unavailable: {}", e),
        }
        // Package ID is a single multi-byte register
        prod_info_addr = prod_info_addr.wrapping_add(1);
    }

    if props.has_build_id_query {
        let mut buf = [0u8; BUILD_ID_LEN];
        match transport.read(prod_info_addr, &mut buf) {
            Ok(_) => props.build_id = Some(decode_build_id(&buf)),
            Err(e) => debug!("Build ID unavailable: {}", e),
        }
    }

    debug!(
        "F01 properties: product {:?}, manufacturer {}, built {}",
        props.product_id, props.manufacturer_id, props.date_of_manufacture
    );
    Ok(props)
}
