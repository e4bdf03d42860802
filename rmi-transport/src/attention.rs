//! Attention report queue
//!
//! Bounded FIFO shared between the input-report reader (producer) and
//! callers blocked in `wait_for_attention` (consumers). Attention is a
//! coalescing signal, so a full queue drops its oldest report instead of
//! applying backpressure to the reader.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::types::{AttentionReport, AttentionWait};

/// Number of attention reports held before the oldest is evicted
pub const ATTN_QUEUE_CAPACITY: usize = 8;

/// Bounded attention queue with blocking wait and cancellation
pub struct AttentionQueue {
    reports: Mutex<VecDeque<AttentionReport>>,
    available: Condvar,
    canceled: AtomicBool,
    capacity: usize,
}

impl Default for AttentionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AttentionQueue {
    pub fn new() -> Self {
        Self::with_capacity(ATTN_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "attention queue capacity must be nonzero");
        Self {
            reports: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            canceled: AtomicBool::new(false),
            capacity,
        }
    }

    /// Queue a report, evicting the oldest when full
    ///
    /// Returns the evicted report, if any.
    pub fn push(&self, report: AttentionReport) -> Option<AttentionReport> {
        let evicted = {
            let mut reports = self.reports.lock();
            let evicted = if reports.len() >= self.capacity {
                reports.pop_front()
            } else {
                None
            };
            reports.push_back(report);
            evicted
        };
        if evicted.is_some() {
            trace!("Attention queue full, evicted oldest report");
        }
        self.available.notify_one();
        evicted
    }

    /// Pop the oldest report without blocking
    pub fn try_pop(&self) -> Option<AttentionReport> {
        self.reports.lock().pop_front()
    }

    /// Block until a report matching `source_mask` is queued
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` only polls. Reports
    /// that do not match the mask are consumed and discarded. Cancellation
    /// is checked before every pop and after every wakeup.
    pub fn wait(
        &self,
        timeout: Option<Duration>,
        source_mask: u32,
    ) -> AttentionWait<AttentionReport> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut reports = self.reports.lock();

        loop {
            if self.is_canceled() {
                return AttentionWait::Canceled;
            }

            while let Some(report) = reports.pop_front() {
                if report.matches(source_mask) {
                    return AttentionWait::Ready(report);
                }
                trace!(
                    "Discarding attention report with sources 0x{:02X} (mask 0x{:02X})",
                    report.sources,
                    source_mask
                );
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return AttentionWait::TimedOut;
                    }
                    // The lock is released while parked
                    self.available.wait_until(&mut reports, deadline);
                }
                None => self.available.wait(&mut reports),
            }
        }
    }

    /// Cancel current and future waits
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag store against a waiter that has
        // checked the flag but not yet parked.
        let _reports = self.reports.lock();
        self.available.notify_all();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}
