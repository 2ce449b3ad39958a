//! Observability and Metrics
//!
//! Counters for login handshakes and session tokens.
//!
//! Uses atomic counters for thread-safe metrics collection. A server owns one
//! `Metrics` instance behind an `Arc`; callers can share it with their own
//! reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Accepted client-first messages
    pub handshakes_started: AtomicU64,
    /// Handshakes that ended with an issued token
    pub handshakes_completed: AtomicU64,
    /// Handshakes rejected at either step
    pub handshakes_failed: AtomicU64,
    /// client-first messages turned away because the pending table was full
    pub pending_rejected: AtomicU64,
    /// Tokens minted
    pub tokens_issued: AtomicU64,
    /// Successful token validations
    pub tokens_validated: AtomicU64,
    /// Tokens found expired on access
    pub tokens_expired: AtomicU64,
    /// Tokens removed by explicit invalidation
    pub tokens_invalidated: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            handshakes_started: AtomicU64::new(0),
            handshakes_completed: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            pending_rejected: AtomicU64::new(0),
            tokens_issued: AtomicU64::new(0),
            tokens_validated: AtomicU64::new(0),
            tokens_expired: AtomicU64::new(0),
            tokens_invalidated: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn handshake_started(&self) {
        self.handshakes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_rejected(&self) {
        self.pending_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_validated(&self) {
        self.tokens_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_expired(&self) {
        self.tokens_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_invalidated(&self) {
        self.tokens_invalidated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handshakes_started: self.handshakes_started.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            pending_rejected: self.pending_rejected.load(Ordering::Relaxed),
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            tokens_validated: self.tokens_validated.load(Ordering::Relaxed),
            tokens_expired: self.tokens_expired.load(Ordering::Relaxed),
            tokens_invalidated: self.tokens_invalidated.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            handshakes_started = snapshot.handshakes_started,
            handshakes_completed = snapshot.handshakes_completed,
            handshakes_failed = snapshot.handshakes_failed,
            pending_rejected = snapshot.pending_rejected,
            tokens_issued = snapshot.tokens_issued,
            tokens_validated = snapshot.tokens_validated,
            tokens_expired = snapshot.tokens_expired,
            tokens_invalidated = snapshot.tokens_invalidated,
            uptime_seconds = snapshot.uptime_seconds,
            "SCRAM metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub handshakes_started: u64,
    pub handshakes_completed: u64,
    pub handshakes_failed: u64,
    pub pending_rejected: u64,
    pub tokens_issued: u64,
    pub tokens_validated: u64,
    pub tokens_expired: u64,
    pub tokens_invalidated: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
