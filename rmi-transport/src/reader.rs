//! Input report reader
//!
//! A dedicated thread reads every input report the device emits and routes
//! it by report ID: read-data responses go to the [`ResponseMailbox`] the
//! register read path is waiting on, attention reports go to the
//! [`AttentionQueue`]. Anything else is dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hidapi::HidDevice;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::attention::AttentionQueue;
use crate::error::TransportError;
use crate::protocol::{parse_input_report, report_id, timing, InputReport};

/// Read-data chunks kept before the oldest is discarded
const MAILBOX_CAPACITY: usize = 64;

/// Blocking source of raw input reports
pub trait InputSource {
    /// Read one report, returning 0 on timeout
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;
}

impl InputSource for HidDevice {
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(self.read_timeout(buf, timeout_ms)?)
    }
}

/// Read-data payloads awaiting the register read in flight
#[derive(Default)]
pub struct ResponseMailbox {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
}

impl ResponseMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: Vec<u8>) {
        {
            let mut chunks = self.chunks.lock();
            if chunks.len() >= MAILBOX_CAPACITY {
                chunks.pop_front();
            }
            chunks.push_back(chunk);
        }
        self.ready.notify_one();
    }

    /// Drop stale chunks left over from an earlier request
    pub fn clear(&self) {
        self.chunks.lock().clear();
    }

    /// Discard chunks until none arrives for `quiet`
    ///
    /// Read-data reports carry no address, so responses still in flight
    /// from an abandoned request must be consumed before the next one is
    /// sent. Returns the number of chunks discarded.
    pub fn drain_until_quiet(&self, quiet: Duration) -> usize {
        let mut discarded = 0;
        while discarded < MAILBOX_CAPACITY && self.recv(quiet).is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} late read-data chunks", discarded);
        }
        discarded
    }

    /// Wait up to `timeout` for the next chunk
    pub fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut chunks = self.chunks.lock();
        loop {
            if let Some(chunk) = chunks.pop_front() {
                return Some(chunk);
            }
            if self.ready.wait_until(&mut chunks, deadline).timed_out() {
                return chunks.pop_front();
            }
        }
    }
}

/// Configuration for the reader loop
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Read timeout in milliseconds (for checking shutdown flag when idle)
    pub read_timeout_ms: i32,
    /// Sleep duration on error before retrying
    pub error_sleep_ms: u64,
    /// Input report buffer size
    pub input_report_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: timing::READER_POLL_MS,
            error_sleep_ms: timing::READER_ERROR_SLEEP_MS,
            input_report_size: 64,
        }
    }
}

/// Route one raw input report
pub fn dispatch_input_report(report: &[u8], queue: &AttentionQueue, mailbox: &ResponseMailbox) {
    match parse_input_report(report) {
        InputReport::ReadData(data) => mailbox.push(data.to_vec()),
        InputReport::Attention(attn) => {
            trace!("Attention report, sources 0x{:02X}", attn.sources);
            queue.push(attn);
        }
        InputReport::Malformed => {
            trace!("Dropping undersized report: {:02X?}", report);
        }
        InputReport::Other(id) => {
            trace!("Dropping report 0x{:02X} ({})", id, report_id::name(id));
        }
    }
}

/// Reader loop, runs until `shutdown` is set
pub fn run_reader_loop<S: InputSource>(
    source: S,
    queue: Arc<AttentionQueue>,
    mailbox: Arc<ResponseMailbox>,
    shutdown: Arc<AtomicBool>,
    config: ReaderConfig,
) {
    debug!("RMI input reader thread started");
    let mut buf = vec![0u8; config.input_report_size.max(1)];

    while !shutdown.load(Ordering::Relaxed) {
        // Short timeout only bounds how long shutdown takes when idle
        match source.read_report(&mut buf, config.read_timeout_ms) {
            Ok(len) if len > 0 => dispatch_input_report(&buf[..len], &queue, &mailbox),
            Ok(_) => {}
            Err(e) => {
                warn!("RMI input reader error: {}", e);
                std::thread::sleep(Duration::from_millis(config.error_sleep_ms));
            }
        }
    }

    debug!("RMI input reader thread exiting");
}
