//! In-memory register map transport for device tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rmi_device::RmiDevice;
use rmi_transport::{
    AttentionQueue, AttentionReport, AttentionWait, ReportMode, Transport, TransportDeviceInfo,
    TransportError,
};

/// A register transaction seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read { addr: u16, len: usize },
    Write { addr: u16, data: Vec<u8> },
}

/// Byte-addressed register space plus multi-byte registers
///
/// A read that starts at a multi-byte register's address with exactly its
/// length returns the register contents; any other read comes from the
/// byte map.
pub struct MockTransport {
    bytes: Mutex<Vec<u8>>,
    registers: Mutex<HashMap<(u16, usize), Vec<u8>>>,
    failing: Mutex<HashSet<u16>>,
    log: Mutex<Vec<Op>>,
    queue: AttentionQueue,
    open: AtomicBool,
    info: TransportDeviceInfo,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new(vec![0u8; 0x10000]),
            registers: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
            queue: AttentionQueue::new(),
            open: AtomicBool::new(true),
            info: TransportDeviceInfo {
                device_path: "mock".into(),
                ..Default::default()
            },
        })
    }

    pub fn set_bytes(&self, addr: u16, data: &[u8]) {
        let mut bytes = self.bytes.lock();
        let start = addr as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
    }

    pub fn set_register(&self, addr: u16, data: &[u8]) {
        self.registers.lock().insert((addr, data.len()), data.to_vec());
    }

    /// Place a PDT entry at `offset` on `page`
    pub fn set_pdt_entry(&self, page: u8, offset: u8, entry: [u8; 6]) {
        self.set_bytes(((page as u16) << 8) | offset as u16, &entry);
    }

    /// Make any transaction starting at `addr` fail
    pub fn fail_at(&self, addr: u16) {
        self.failing.lock().insert(addr);
    }

    pub fn push_attention(&self, report: AttentionReport) {
        self.queue.push(report);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.lock().clone()
    }

    pub fn reads(&self) -> Vec<(u16, usize)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Read { addr, len } => Some((addr, len)),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write { addr, data } => Some((addr, data)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    fn check(&self, addr: u16, len: usize) -> Result<(), TransportError> {
        if self.failing.lock().contains(&addr) {
            return Err(TransportError::ShortRead {
                addr,
                expected: len,
                actual: 0,
            });
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.log.lock().push(Op::Read {
            addr,
            len: buf.len(),
        });
        self.check(addr, buf.len())?;

        if let Some(data) = self.registers.lock().get(&(addr, buf.len())) {
            buf.copy_from_slice(data);
            return Ok(buf.len());
        }

        let bytes = self.bytes.lock();
        let start = addr as usize;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(buf.len())
    }

    fn write(&self, addr: u16, data: &[u8]) -> Result<usize, TransportError> {
        self.log.lock().push(Op::Write {
            addr,
            data: data.to_vec(),
        });
        self.check(addr, data.len())?;
        Ok(data.len())
    }

    fn set_mode(&self, _mode: ReportMode) -> Result<(), TransportError> {
        Ok(())
    }

    fn wait_for_attention(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
    ) -> Result<AttentionWait<AttentionReport>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        Ok(self.queue.wait(timeout, source_mask))
    }

    fn cancel(&self) {
        self.queue.cancel();
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.queue.cancel();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

/// F01 query base used by the fixtures
pub const F01_QUERY_BASE: u16 = 0x0040;
/// F01 command base used by the fixtures
pub const F01_COMMAND_BASE: u16 = 0x0036;

/// Mock with F01 on page 0, basic query flags `query1`, and a scanned device
pub fn f01_device(query1: u8) -> (Arc<MockTransport>, RmiDevice) {
    let mock = MockTransport::new();
    mock.set_pdt_entry(
        0,
        0xE9,
        [
            F01_QUERY_BASE as u8,
            F01_COMMAND_BASE as u8,
            0x14,
            0x06,
            0x01,
            0x01,
        ],
    );

    let mut basic = [0u8; 21];
    basic[0] = 0x01;
    basic[1] = query1;
    basic[2] = 0x02;
    basic[3] = 0x01;
    basic[5] = 0x05;
    basic[6] = 0x03;
    basic[7] = 0x11;
    basic[11..21].copy_from_slice(b"TM3145-001");
    mock.set_bytes(F01_QUERY_BASE, &basic);

    let mut device = RmiDevice::new(mock.clone());
    device.scan_pdt().expect("scan");
    mock.clear_log();
    (mock, device)
}
