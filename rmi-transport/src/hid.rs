//! RMI over HID transport (hidraw)

use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::attention::AttentionQueue;
use crate::descriptor::{parse_report_sizes, MAX_DESCRIPTOR_SIZE};
use crate::error::TransportError;
use crate::protocol::{self, timing};
use crate::reader::{run_reader_loop, ReaderConfig, ResponseMailbox};
use crate::types::{AttentionReport, AttentionWait, ReportMode, ReportSizes, TransportDeviceInfo};
use crate::Transport;

/// Settings applied when opening a [`HidTransport`]
#[derive(Debug, Clone)]
pub struct HidTransportConfig {
    /// Mode selected right after open
    pub initial_mode: ReportMode,
    /// Largest read issued as one request, 0 for no limit
    pub bytes_per_read_request: usize,
    /// Wait for each read-data report
    pub read_timeout: Duration,
    /// Reader thread poll interval in milliseconds
    pub reader_poll_ms: i32,
}

impl Default for HidTransportConfig {
    fn default() -> Self {
        Self {
            initial_mode: ReportMode::AttentionReports,
            bytes_per_read_request: 0,
            read_timeout: Duration::from_millis(timing::READ_TIMEOUT_MS),
            reader_poll_ms: timing::READER_POLL_MS,
        }
    }
}

impl HidTransportConfig {
    pub fn with_mode(mut self, mode: ReportMode) -> Self {
        self.initial_mode = mode;
        self
    }

    pub fn with_bytes_per_read_request(mut self, bytes: usize) -> Self {
        self.bytes_per_read_request = bytes;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Output side of an RMI HID device
///
/// Register requests go out through this handle; their responses come
/// back through the reader thread.
pub trait ReportSink: Send {
    /// Send an output report, returning the bytes written
    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError>;

    fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError>;
}

impl ReportSink for HidDevice {
    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError> {
        Ok(self.write(report)?)
    }

    fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError> {
        Ok(HidDevice::send_feature_report(self, report)?)
    }
}

/// Resources held while the transport is open
struct OpenState {
    /// Handle used for register transactions
    device: Box<dyn ReportSink>,
    sizes: ReportSizes,
    reader: Option<JoinHandle<()>>,
}

/// HID transport for RMI4 devices exposed through hidraw
///
/// Register reads and writes go out as output reports on one handle. A
/// second handle on the same node feeds a reader thread that collects
/// read-data responses and queues attention reports.
pub struct HidTransport {
    io: Mutex<Option<OpenState>>,
    open: AtomicBool,
    queue: Arc<AttentionQueue>,
    mailbox: Arc<ResponseMailbox>,
    shutdown: Arc<AtomicBool>,
    info: TransportDeviceInfo,
    config: HidTransportConfig,
}

fn unavailable(path: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::DeviceUnavailable(format!("{}: {}", path, e))
}

impl HidTransport {
    /// Open a hidraw node (e.g. `/dev/hidraw0`)
    pub fn open(path: &str, config: HidTransportConfig) -> Result<Self, TransportError> {
        let api = HidApi::new_without_enumerate().map_err(|e| unavailable(path, e))?;
        let c_path = CString::new(path).map_err(|e| unavailable(path, e))?;
        let device = api.open_path(&c_path).map_err(|e| unavailable(path, e))?;
        let input = api.open_path(&c_path).map_err(|e| unavailable(path, e))?;

        let mut desc = vec![0u8; MAX_DESCRIPTOR_SIZE];
        let desc_len = device.get_report_descriptor(&mut desc)?;
        let sizes = parse_report_sizes(&desc[..desc_len])?;

        let info = match device.get_device_info() {
            Ok(dev) => TransportDeviceInfo {
                vid: dev.vendor_id(),
                pid: dev.product_id(),
                device_path: path.to_string(),
                product_name: dev.product_string().map(str::to_string),
            },
            Err(e) => {
                debug!("No device info for {}: {}", path, e);
                TransportDeviceInfo {
                    device_path: path.to_string(),
                    ..Default::default()
                }
            }
        };

        let queue = Arc::new(AttentionQueue::new());
        let mailbox = Arc::new(ResponseMailbox::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader_config = ReaderConfig {
            read_timeout_ms: config.reader_poll_ms,
            input_report_size: sizes.input,
            ..ReaderConfig::default()
        };
        let reader = {
            let queue = Arc::clone(&queue);
            let mailbox = Arc::clone(&mailbox);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("rmi-input-reader".into())
                .spawn(move || run_reader_loop(input, queue, mailbox, shutdown, reader_config))
                .map_err(|e| TransportError::Internal(format!("spawn reader: {}", e)))?
        };

        let transport = Self::from_parts(
            Box::new(device),
            sizes,
            Some(reader),
            queue,
            mailbox,
            shutdown,
            info,
            config,
        );

        transport.set_mode(transport.config.initial_mode)?;

        info!(
            "Opened RMI device {} ({:04X}:{:04X}), reports in={} out={} feature={}",
            path,
            transport.info.vid,
            transport.info.pid,
            sizes.input,
            sizes.output,
            sizes.feature
        );
        Ok(transport)
    }

    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        device: Box<dyn ReportSink>,
        sizes: ReportSizes,
        reader: Option<JoinHandle<()>>,
        queue: Arc<AttentionQueue>,
        mailbox: Arc<ResponseMailbox>,
        shutdown: Arc<AtomicBool>,
        info: TransportDeviceInfo,
        config: HidTransportConfig,
    ) -> Self {
        Self {
            io: Mutex::new(Some(OpenState {
                device,
                sizes,
                reader,
            })),
            open: AtomicBool::new(true),
            queue,
            mailbox,
            shutdown,
            info,
            config,
        }
    }

    /// Report sizes learned from the descriptor
    pub fn report_sizes(&self) -> Option<ReportSizes> {
        self.io.lock().as_ref().map(|state| state.sizes)
    }

    /// Request one chunk and collect its read-data responses
    fn read_chunk(
        &self,
        state: &OpenState,
        addr: u16,
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let len = buf.len();
        let request = protocol::build_read_request(addr, len as u16, state.sizes.output);
        let mut received = 0;

        for attempt in 0..timing::READ_RETRIES {
            self.mailbox.clear();
            state.device.write_report(&request)?;

            received = 0;
            while received < len {
                match self.mailbox.recv(self.config.read_timeout) {
                    Some(chunk) if !chunk.is_empty() => {
                        let n = chunk.len().min(len - received);
                        buf[received..received + n].copy_from_slice(&chunk[..n]);
                        received += n;
                    }
                    _ => break,
                }
            }

            if received == len {
                return Ok(());
            }
            debug!(
                "Read attempt {} at 0x{:04X}: got {}/{} bytes",
                attempt, addr, received, len
            );
            // Chunks of the abandoned request may still be on their way
            self.mailbox.drain_until_quiet(self.config.read_timeout);
        }

        Err(TransportError::ShortRead {
            addr,
            expected: len,
            actual: received,
        })
    }
}

impl Transport for HidTransport {
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<usize, TransportError> {
        let io = self.io.lock();
        let state = io.as_ref().ok_or(TransportError::NotOpen)?;

        let chunk_len = match self.config.bytes_per_read_request {
            0 => buf.len(),
            n => n,
        }
        .min(u16::MAX as usize);

        let mut offset = 0;
        while offset < buf.len() {
            let len = (buf.len() - offset).min(chunk_len);
            let chunk_addr = addr.wrapping_add(offset as u16);
            self.read_chunk(state, chunk_addr, &mut buf[offset..offset + len])?;
            offset += len;
        }

        debug!("Read 0x{:04X} [{}]: {:02X?}", addr, buf.len(), buf);
        Ok(buf.len())
    }

    fn write(&self, addr: u16, data: &[u8]) -> Result<usize, TransportError> {
        let io = self.io.lock();
        let state = io.as_ref().ok_or(TransportError::NotOpen)?;

        let max = protocol::max_write_payload(state.sizes.output);
        if max == 0 {
            return Err(TransportError::InvalidReport(format!(
                "output report of {} bytes cannot carry a write",
                state.sizes.output
            )));
        }

        debug!("Write 0x{:04X} [{}]: {:02X?}", addr, data.len(), data);
        let mut written = 0;
        for chunk in data.chunks(max) {
            let chunk_addr = addr.wrapping_add(written as u16);
            let report = protocol::build_write_report(chunk_addr, chunk, state.sizes.output)?;
            let sent = state.device.write_report(&report)?;
            if sent < report.len() {
                return Err(TransportError::ShortWrite {
                    addr,
                    expected: data.len(),
                    actual: written,
                });
            }
            written += chunk.len();
        }

        Ok(written)
    }

    fn set_mode(&self, mode: ReportMode) -> Result<(), TransportError> {
        let io = self.io.lock();
        let state = io.as_ref().ok_or(TransportError::NotOpen)?;
        let report = protocol::build_set_mode(mode, state.sizes.feature);
        state.device.send_feature_report(&report)?;
        debug!("Set report mode {:?}", mode);
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
        let Some(mut state) = self.io.lock().take() else {
            return;
        };
        self.open.store(false, Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);
        // Waiters parked on the queue observe this as cancellation
        self.queue.cancel();

        if let Some(reader) = state.reader.take() {
            if reader.join().is_err() {
                warn!("RMI input reader thread panicked");
            }
        }
        debug!("Closed {}", self.info.device_path);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::report_id;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Chunks answering one read request, each pushed after a delay (ms)
    type Response = Vec<(u64, Vec<u8>)>;

    const SIZES: ReportSizes = ReportSizes {
        input: 21,
        output: 21,
        feature: 4,
    };

    /// Answers read requests from a script through the mailbox
    struct ScriptedDevice {
        mailbox: Arc<ResponseMailbox>,
        responses: Mutex<VecDeque<Response>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        drop_last_byte: bool,
    }

    impl ReportSink for ScriptedDevice {
        fn write_report(&self, report: &[u8]) -> Result<usize, TransportError> {
            self.sent.lock().push(report.to_vec());
            if report[0] == report_id::READ_ADDR {
                let response = self.responses.lock().pop_front().unwrap_or_default();
                let mailbox = Arc::clone(&self.mailbox);
                std::thread::spawn(move || {
                    let start = Instant::now();
                    for (delay_ms, chunk) in response {
                        let at = start + Duration::from_millis(delay_ms);
                        if let Some(wait) = at.checked_duration_since(Instant::now()) {
                            std::thread::sleep(wait);
                        }
                        mailbox.push(chunk);
                    }
                });
            }
            if self.drop_last_byte {
                Ok(report.len() - 1)
            } else {
                Ok(report.len())
            }
        }

        fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError> {
            self.sent.lock().push(report.to_vec());
            Ok(())
        }
    }

    struct Harness {
        transport: HidTransport,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Harness {
        fn new(responses: Vec<Response>, config: HidTransportConfig) -> Self {
            Self::build(responses, config, false)
        }

        fn build(responses: Vec<Response>, config: HidTransportConfig, drop_last_byte: bool) -> Self {
            let mailbox = Arc::new(ResponseMailbox::new());
            let sent = Arc::new(Mutex::new(Vec::new()));
            let device = ScriptedDevice {
                mailbox: Arc::clone(&mailbox),
                responses: Mutex::new(responses.into()),
                sent: Arc::clone(&sent),
                drop_last_byte,
            };
            let transport = HidTransport::from_parts(
                Box::new(device),
                SIZES,
                None,
                Arc::new(AttentionQueue::new()),
                mailbox,
                Arc::new(AtomicBool::new(false)),
                TransportDeviceInfo::default(),
                config,
            );
            Self { transport, sent }
        }

        fn read_requests(&self) -> Vec<(u16, u16)> {
            self.sent
                .lock()
                .iter()
                .filter(|r| r[0] == report_id::READ_ADDR)
                .map(|r| {
                    (
                        u16::from_le_bytes([r[2], r[3]]),
                        u16::from_le_bytes([r[4], r[5]]),
                    )
                })
                .collect()
        }
    }

    fn config(read_timeout_ms: u64) -> HidTransportConfig {
        HidTransportConfig::default().with_read_timeout(Duration::from_millis(read_timeout_ms))
    }

    #[test]
    fn test_read_assembles_chunks() {
        let h = Harness::new(vec![vec![(0, vec![1, 2, 3]), (0, vec![4, 5])]], config(200));

        let mut buf = [0u8; 5];
        assert_eq!(h.transport.read(0x0123, &mut buf).unwrap(), 5);

        assert_eq!(buf, [1, 2, 3, 4, 5]);
        assert_eq!(
            h.sent.lock().as_slice(),
            &[protocol::build_read_request(0x0123, 5, SIZES.output)]
        );
    }

    #[test]
    fn test_incomplete_read_is_retried() {
        let h = Harness::new(
            vec![vec![(0, vec![9, 9])], vec![(0, vec![1, 2, 3, 4])]],
            config(20),
        );

        let mut buf = [0u8; 4];
        h.transport.read(0x0040, &mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(h.read_requests(), vec![(0x0040, 4), (0x0040, 4)]);
    }

    #[test]
    fn test_read_gives_up_after_retries() {
        let h = Harness::new(vec![vec![(0, vec![1])]; timing::READ_RETRIES], config(10));

        let mut buf = [0u8; 4];
        let err = h.transport.read(0x0040, &mut buf).unwrap_err();

        assert!(matches!(
            err,
            TransportError::ShortRead {
                addr: 0x0040,
                expected: 4,
                actual: 1
            }
        ));
        assert_eq!(h.read_requests().len(), timing::READ_RETRIES);
    }

    #[test]
    fn test_late_chunk_not_mixed_into_retry() {
        // The first attempt times out at 40ms; its straggler lands at 60ms
        let h = Harness::new(
            vec![
                vec![(0, vec![0xA0, 0xA1]), (60, vec![0xEE, 0xEE])],
                vec![(30, vec![0xA0, 0xA1]), (30, vec![0xA2, 0xA3])],
            ],
            config(40),
        );

        let mut buf = [0u8; 4];
        h.transport.read(0x0200, &mut buf).unwrap();

        assert_eq!(buf, [0xA0, 0xA1, 0xA2, 0xA3]);
    }

    #[test]
    fn test_read_split_by_bytes_per_request() {
        let h = Harness::new(
            vec![vec![(0, vec![1, 2, 3, 4])], vec![(0, vec![5, 6])]],
            config(200).with_bytes_per_read_request(4),
        );

        let mut buf = [0u8; 6];
        h.transport.read(0x0010, &mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
        assert_eq!(h.read_requests(), vec![(0x0010, 4), (0x0014, 2)]);
    }

    #[test]
    fn test_write_split_advances_address() {
        let h = Harness::new(Vec::new(), config(200));
        let data: Vec<u8> = (0..40).collect();

        assert_eq!(h.transport.write(0x0200, &data).unwrap(), 40);

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 3);
        assert_eq!(&sent[0][..5], &[0x09, 17, 0x00, 0x02, 0]);
        assert_eq!(&sent[1][..5], &[0x09, 17, 0x11, 0x02, 17]);
        assert_eq!(&sent[2][..5], &[0x09, 6, 0x22, 0x02, 34]);
        assert!(sent.iter().all(|r| r.len() == SIZES.output));
    }

    #[test]
    fn test_truncated_write_fails() {
        let h = Harness::build(Vec::new(), config(200), true);
        assert!(matches!(
            h.transport.write(0x00FF, &[1]),
            Err(TransportError::ShortWrite { addr: 0x00FF, .. })
        ));
    }

    #[test]
    fn test_set_mode_feature_report() {
        let h = Harness::new(Vec::new(), config(200));
        h.transport.set_mode(ReportMode::NoPackedAttentionReports).unwrap();
        assert_eq!(h.sent.lock().as_slice(), &[vec![0x0F, 0x02, 0x00, 0x00]]);
    }

    #[test]
    fn test_operations_after_close() {
        let h = Harness::new(Vec::new(), config(200));
        h.transport.close();
        h.transport.close();

        assert!(!h.transport.is_open());
        let mut buf = [0u8; 1];
        assert!(matches!(
            h.transport.read(0, &mut buf),
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(
            h.transport.wait_for_attention(Some(Duration::ZERO), u32::MAX),
            Err(TransportError::NotOpen)
        ));
    }
}
