//! Blocking behavior of the attention queue across threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use rmi_transport::{AttentionQueue, AttentionReport, AttentionWait, ALL_SOURCES};

/// Slack allowed for thread scheduling
const TOLERANCE: Duration = Duration::from_millis(100);

fn report(n: u8) -> AttentionReport {
    AttentionReport::new(0x01, vec![n])
}

#[test]
fn empty_queue_times_out_after_timeout() {
    let queue = AttentionQueue::new();
    let timeout = Duration::from_millis(50);

    let start = Instant::now();
    let outcome = queue.wait(Some(timeout), ALL_SOURCES);
    let elapsed = start.elapsed();

    assert_eq!(outcome, AttentionWait::TimedOut);
    assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
    assert!(
        elapsed < timeout + TOLERANCE,
        "returned late after {:?}",
        elapsed
    );
}

#[test]
fn queued_report_is_returned_immediately() {
    let queue = AttentionQueue::new();
    queue.push(report(1));

    let start = Instant::now();
    let outcome = queue.wait(Some(Duration::from_secs(5)), ALL_SOURCES);

    assert_eq!(outcome, AttentionWait::Ready(report(1)));
    assert!(start.elapsed() < TOLERANCE);
}

#[test]
fn cancel_unblocks_parked_waiter() {
    let queue = Arc::new(AttentionQueue::new());

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let start = Instant::now();
            let outcome = queue.wait(None, ALL_SOURCES);
            (outcome, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(30));
    let canceled_at = Instant::now();
    queue.cancel();

    let (outcome, _) = waiter.join().unwrap();
    assert_eq!(outcome, AttentionWait::Canceled);
    assert!(canceled_at.elapsed() < Duration::from_millis(500));
}

#[test]
fn producer_wakes_blocked_consumer() {
    let queue = Arc::new(AttentionQueue::new());

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.wait(Some(Duration::from_secs(5)), ALL_SOURCES))
    };

    thread::sleep(Duration::from_millis(20));
    queue.push(report(42));

    assert_eq!(waiter.join().unwrap(), AttentionWait::Ready(report(42)));
}

#[test]
fn unmatched_reports_do_not_end_wait() {
    let queue = Arc::new(AttentionQueue::new());

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.wait(Some(Duration::from_secs(5)), 0x08))
    };

    thread::sleep(Duration::from_millis(10));
    queue.push(AttentionReport::new(0x01, vec![1]));
    thread::sleep(Duration::from_millis(10));
    queue.push(AttentionReport::new(0x08, vec![2]));

    assert_eq!(
        waiter.join().unwrap(),
        AttentionWait::Ready(AttentionReport::new(0x08, vec![2]))
    );
}

#[test]
fn ten_pushes_keep_last_eight() {
    let queue = AttentionQueue::new();
    for n in 1..=10 {
        queue.push(report(n));
    }

    let mut kept = Vec::new();
    while let AttentionWait::Ready(r) = queue.wait(Some(Duration::ZERO), ALL_SOURCES) {
        kept.push(r.data[0]);
    }
    assert_eq!(kept, vec![3, 4, 5, 6, 7, 8, 9, 10]);
}

proptest! {
    #[test]
    fn prop_queue_keeps_newest_in_order(count in 0usize..64, capacity in 1usize..16) {
        let queue = AttentionQueue::with_capacity(capacity);
        for n in 0..count {
            queue.push(AttentionReport::new(1, vec![n as u8]));
        }

        let kept: Vec<u8> = std::iter::from_fn(|| queue.try_pop())
            .map(|r| r.data[0])
            .collect();
        let expected: Vec<u8> = (count.saturating_sub(capacity)..count)
            .map(|n| n as u8)
            .collect();
        prop_assert_eq!(kept, expected);
    }
}
