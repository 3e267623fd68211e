//! Counters for the status channel and publisher.
//!
//! # Example
//!
//! ```rust
//! use paystatus_lib::metrics::StatusMetrics;
//!
//! let metrics = StatusMetrics::new();
//! metrics.record_connect_attempt();
//! metrics.record_connection_established();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.connect_attempts, 1);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe counters, shared between a channel and its publisher.
#[derive(Debug)]
pub struct StatusMetrics {
    connect_attempts: AtomicU64,
    connections_established: AtomicU64,
    normal_closes: AtomicU64,
    abnormal_closes: AtomicU64,
    fallback_activations: AtomicU64,
    manual_reconnects: AtomicU64,

    frames_received: AtomicU64,
    decode_failures: AtomicU64,
    events_delivered: AtomicU64,
    statuses_published: AtomicU64,

    start_time: Instant,
}

impl Default for StatusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            normal_closes: AtomicU64::new(0),
            abnormal_closes: AtomicU64::new(0),
            fallback_activations: AtomicU64::new(0),
            manual_reconnects: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            statuses_published: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    // === Connection ===

    /// Record a real connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection that reached the connected state.
    pub fn record_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a close with code 1000 or 1001.
    pub fn record_normal_close(&self) {
        self.normal_closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an abnormal close or failed connect.
    pub fn record_abnormal_close(&self) {
        self.abnormal_closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a switch into fallback mode.
    pub fn record_fallback_activation(&self) {
        self.fallback_activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an explicit `reconnect()`.
    pub fn record_manual_reconnect(&self) {
        self.manual_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    // === Frames ===

    /// Record a text frame read from the channel.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame that failed to decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event handed to the consumer.
    pub fn record_event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a status published to the UI.
    pub fn record_status_published(&self) {
        self.statuses_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            normal_closes: self.normal_closes.load(Ordering::Relaxed),
            abnormal_closes: self.abnormal_closes.load(Ordering::Relaxed),
            fallback_activations: self.fallback_activations.load(Ordering::Relaxed),
            manual_reconnects: self.manual_reconnects.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            statuses_published: self.statuses_published.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StatusMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the collector was created.
    pub uptime_secs: u64,
    /// Real connection attempts.
    pub connect_attempts: u64,
    /// Connections that reached the connected state.
    pub connections_established: u64,
    /// Closes with 1000/1001.
    pub normal_closes: u64,
    /// Abnormal closes and failed connects.
    pub abnormal_closes: u64,
    /// Switches into fallback mode.
    pub fallback_activations: u64,
    /// Explicit reconnects.
    pub manual_reconnects: u64,
    /// Text frames read.
    pub frames_received: u64,
    /// Frames dropped as undecodable.
    pub decode_failures: u64,
    /// Events handed to the consumer.
    pub events_delivered: u64,
    /// Statuses published to the UI.
    pub statuses_published: u64,
}

impl MetricsSnapshot {
    /// Share of received frames that failed to decode, in percent.
    pub fn decode_failure_rate(&self) -> f64 {
        if self.frames_received == 0 {
            0.0
        } else {
            (self.decode_failures as f64 / self.frames_received as f64) * 100.0
        }
    }
}
