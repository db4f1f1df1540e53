//! Observability and Metrics
//!
//! Counters for session lifecycle and packet traffic.
//!
//! Uses atomic counters for thread-safe metrics collection. A [`Metrics`] instance can be
//! shared by every session of a server, or each session can carry its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for codec and session operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions that became active
    pub sessions_total: AtomicU64,
    /// Currently active sessions
    pub sessions_active: AtomicU64,
    /// Sessions that disconnected
    pub disconnects: AtomicU64,
    /// Activations rejected because the session was already bound or disconnected
    pub rejected_channels: AtomicU64,
    /// Packets written to a channel
    pub packets_sent: AtomicU64,
    /// Packets sent through the priority path
    pub priority_sends: AtomicU64,
    /// Sends dropped because no channel was attached
    pub dropped_sends: AtomicU64,
    /// Packets decoded and delivered
    pub packets_received: AtomicU64,
    /// Frame bytes written
    pub bytes_sent: AtomicU64,
    /// Failed encodes
    pub encode_errors: AtomicU64,
    /// Failed decodes
    pub decode_errors: AtomicU64,
    /// Transport failures routed into a disconnect
    pub transport_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            rejected_channels: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            priority_sends: AtomicU64::new(0),
            dropped_sends: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            encode_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a session binding its channel
    pub fn session_activated(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disconnect; `was_active` tells whether the session had a channel
    pub fn session_disconnected(&self, was_active: bool) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        if was_active {
            self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Record a rejected duplicate activation
    pub fn channel_rejected(&self) {
        self.rejected_channels.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet written to the channel
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a send taking the priority path
    pub fn priority_send(&self) {
        self.priority_sends.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a send dropped before activation
    pub fn send_dropped(&self) {
        self.dropped_sends.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet delivered to the receive path
    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            rejected_channels: self.rejected_channels.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            priority_sends: self.priority_sends.load(Ordering::Relaxed),
            dropped_sends: self.dropped_sends.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            disconnects = snapshot.disconnects,
            rejected_channels = snapshot.rejected_channels,
            packets_sent = snapshot.packets_sent,
            priority_sends = snapshot.priority_sends,
            dropped_sends = snapshot.dropped_sends,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            encode_errors = snapshot.encode_errors,
            decode_errors = snapshot.decode_errors,
            transport_errors = snapshot.transport_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
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
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub disconnects: u64,
    pub rejected_channels: u64,
    pub packets_sent: u64,
    pub priority_sends: u64,
    pub dropped_sends: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub encode_errors: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    pub uptime_seconds: u64,
}

/// Process-wide metrics instance
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
