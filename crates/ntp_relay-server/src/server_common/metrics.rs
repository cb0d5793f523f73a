// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Lock-free server metrics using atomic counters.
//!
//! All counters use relaxed ordering. Values read while the server is running
//! are individually accurate but not a consistent cut across counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::DropReason;

/// Runtime counters for the serving loop and the upstream sync loop.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> std::io::Result<()> {
/// use std::sync::Arc;
/// use ntp_server::server::NtpServer;
/// use ntp_server::server_common::ServerMetrics;
///
/// let metrics = Arc::new(ServerMetrics::new());
/// let server = NtpServer::builder()
///     .listen("127.0.0.1:1234")
///     .metrics(metrics.clone())
///     .build()
///     .await?;
///
/// let snap = metrics.snapshot();
/// println!("requests: {}", snap.requests_received);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Datagrams received on the serving socket.
    pub requests_received: AtomicU64,
    /// Replies handed to the transport successfully.
    pub responses_sent: AtomicU64,
    /// Replies the transport failed to send.
    pub send_failures: AtomicU64,
    /// Dropped: length or version matched no variant.
    pub dropped_unrecognized: AtomicU64,
    /// Dropped: length wrong for the chosen variant.
    pub dropped_invalid_length: AtomicU64,
    /// Dropped: reserved or unsupported mode.
    pub dropped_unsupported_mode: AtomicU64,
    /// Dropped: version outside the variant's range.
    pub dropped_unsupported_version: AtomicU64,
    /// Dropped: local clock not representable on the wire.
    pub dropped_range: AtomicU64,
    /// Upstream exchanges that produced a sample.
    pub upstream_successes: AtomicU64,
    /// Upstream exchanges that failed.
    pub upstream_failures: AtomicU64,
    /// Transitions from synchronized to unsynchronized.
    pub degradations: AtomicU64,
}

impl ServerMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            dropped_unrecognized: self.dropped_unrecognized.load(Ordering::Relaxed),
            dropped_invalid_length: self.dropped_invalid_length.load(Ordering::Relaxed),
            dropped_unsupported_mode: self.dropped_unsupported_mode.load(Ordering::Relaxed),
            dropped_unsupported_version: self.dropped_unsupported_version.load(Ordering::Relaxed),
            dropped_range: self.dropped_range.load(Ordering::Relaxed),
            upstream_successes: self.upstream_successes.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn inc_requests_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_responses_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_send_failures(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Unrecognized => &self.dropped_unrecognized,
            DropReason::InvalidLength => &self.dropped_invalid_length,
            DropReason::UnsupportedMode => &self.dropped_unsupported_mode,
            DropReason::UnsupportedVersion => &self.dropped_unsupported_version,
            DropReason::Range => &self.dropped_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_upstream_successes(&self) {
        self.upstream_successes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_degradations(&self) {
        self.degradations.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of server metrics (non-atomic, copyable).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsSnapshot {
    /// Datagrams received on the serving socket.
    pub requests_received: u64,
    /// Replies sent.
    pub responses_sent: u64,
    /// Replies the transport failed to send.
    pub send_failures: u64,
    /// Dropped as unrecognized.
    pub dropped_unrecognized: u64,
    /// Dropped for invalid length.
    pub dropped_invalid_length: u64,
    /// Dropped for unsupported mode.
    pub dropped_unsupported_mode: u64,
    /// Dropped for unsupported version.
    pub dropped_unsupported_version: u64,
    /// Dropped for an unencodable local clock.
    pub dropped_range: u64,
    /// Successful upstream exchanges.
    pub upstream_successes: u64,
    /// Failed upstream exchanges.
    pub upstream_failures: u64,
    /// Synchronized-to-unsynchronized transitions.
    pub degradations: u64,
}

impl MetricsSnapshot {
    /// Total datagrams dropped, across all reasons.
    pub fn requests_dropped(&self) -> u64 {
        self.dropped_unrecognized
            + self.dropped_invalid_length
            + self.dropped_unsupported_mode
            + self.dropped_unsupported_version
            + self.dropped_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default_is_zero() {
        let s = ServerMetrics::new().snapshot();
        assert_eq!(s, MetricsSnapshot::default());
        assert_eq!(s.requests_dropped(), 0);
    }

    #[test]
    fn test_metrics_increment() {
        let m = ServerMetrics::new();
        m.inc_requests_received();
        m.inc_requests_received();
        m.inc_responses_sent();
        m.inc_dropped(DropReason::UnsupportedMode);
        m.inc_dropped(DropReason::Unrecognized);
        m.inc_degradations();
        let s = m.snapshot();
        assert_eq!(s.requests_received, 2);
        assert_eq!(s.responses_sent, 1);
        assert_eq!(s.dropped_unsupported_mode, 1);
        assert_eq!(s.requests_dropped(), 2);
        assert_eq!(s.degradations, 1);
    }
}
