//! Observability and Metrics
//!
//! Per-session counters for call correlation and dispatch.
//!
//! Uses atomic counters so the reader path never takes a lock to record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector shared by a session's registry, dispatcher and driver
#[derive(Debug)]
pub struct RpcMetrics {
    /// Calls registered and sent
    pub calls_issued: AtomicU64,
    /// Calls whose future was dropped or timed out before a response
    pub calls_cancelled: AtomicU64,
    /// Responses matched to a pending call
    pub responses_matched: AtomicU64,
    /// Responses with no pending call (stale, duplicate or abandoned)
    pub responses_dropped: AtomicU64,
    /// Exception responses received from the peer
    pub remote_failures: AtomicU64,
    /// Response bodies that failed to decode
    pub decode_failures: AtomicU64,
    /// Inbound calls dispatched to a handler
    pub calls_handled: AtomicU64,
    /// Exception responses sent to the peer
    pub exceptions_sent: AtomicU64,
    /// Exception responses that could not be sent
    pub exception_send_failures: AtomicU64,
    /// Pending calls failed by session teardown
    pub calls_failed_on_close: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl RpcMetrics {
    pub fn new() -> Self {
        Self {
            calls_issued: AtomicU64::new(0),
            calls_cancelled: AtomicU64::new(0),
            responses_matched: AtomicU64::new(0),
            responses_dropped: AtomicU64::new(0),
            remote_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            calls_handled: AtomicU64::new(0),
            exceptions_sent: AtomicU64::new(0),
            exception_send_failures: AtomicU64::new(0),
            calls_failed_on_close: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn call_issued(&self) {
        self.calls_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_cancelled(&self) {
        self.calls_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_matched(&self) {
        self.responses_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_dropped(&self) {
        self.responses_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_failure(&self) {
        self.remote_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_handled(&self) {
        self.calls_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of marshaling a failure back to the peer
    pub fn exception_sent(&self, delivered: bool) {
        if delivered {
            self.exceptions_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.exception_send_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn failed_on_close(&self, count: u64) {
        self.calls_failed_on_close
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_issued: self.calls_issued.load(Ordering::Relaxed),
            calls_cancelled: self.calls_cancelled.load(Ordering::Relaxed),
            responses_matched: self.responses_matched.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            calls_handled: self.calls_handled.load(Ordering::Relaxed),
            exceptions_sent: self.exceptions_sent.load(Ordering::Relaxed),
            exception_send_failures: self.exception_send_failures.load(Ordering::Relaxed),
            calls_failed_on_close: self.calls_failed_on_close.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            calls_issued = snapshot.calls_issued,
            calls_cancelled = snapshot.calls_cancelled,
            responses_matched = snapshot.responses_matched,
            responses_dropped = snapshot.responses_dropped,
            remote_failures = snapshot.remote_failures,
            decode_failures = snapshot.decode_failures,
            calls_handled = snapshot.calls_handled,
            exceptions_sent = snapshot.exceptions_sent,
            exception_send_failures = snapshot.exception_send_failures,
            calls_failed_on_close = snapshot.calls_failed_on_close,
            uptime_seconds = snapshot.uptime_seconds,
            "Rpc metrics snapshot"
        );
    }
}

impl Default for RpcMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls_issued: u64,
    pub calls_cancelled: u64,
    pub responses_matched: u64,
    pub responses_dropped: u64,
    pub remote_failures: u64,
    pub decode_failures: u64,
    pub calls_handled: u64,
    pub exceptions_sent: u64,
    pub exception_send_failures: u64,
    pub calls_failed_on_close: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring handler duration
pub struct Timer {
    start: Instant,
    operation: String,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
