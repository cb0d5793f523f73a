//! Keeps the shared clock state synchronized to one upstream server.
//!
//! [`UpstreamSync`] runs one exchange immediately and then one per interval.
//! A good reply publishes a fresh [`ClockState`]; after `failure_threshold`
//! consecutive failures the state is degraded to unsynchronized, so clients
//! are never served stale synchronization claims.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use ntp_client::ExchangeError;
use ntp_client::exchange::{SyncSample, build_request_bytes, parse_reply, validate_reply};
use tokio::time::MissedTickBehavior;

use crate::protocol::{
    self, LeapIndicator, ReferenceIdentifier, ShortFormat, Stratum, TimeOffset, TimestampFormat,
};
use crate::server_common::{ClockHandle, ClockState, ServerMetrics, SyncStatus};
use crate::transport::Transport;
use crate::unix_time;

const RECV_BUF_LEN: usize = 1024;

/// Shortest interval the loop will schedule; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Where and how often to synchronize.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UpstreamConfig {
    /// The upstream server.
    pub server: SocketAddr,
    /// Time between exchanges. Raised to 1 ms if shorter.
    pub interval: Duration,
    /// Bound on one exchange, from send to accepted reply.
    pub timeout: Duration,
    /// Consecutive failures before the clock state degrades. At least 1.
    pub failure_threshold: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SyncState {
    Idle,
    AwaitingReply { t1: TimestampFormat },
}

/// The upstream synchronization loop.
pub struct UpstreamSync<T: Transport> {
    transport: T,
    config: UpstreamConfig,
    clock: ClockHandle,
    metrics: Arc<ServerMetrics>,
    state: SyncState,
    consecutive_failures: u32,
}

impl<T: Transport> UpstreamSync<T> {
    /// Create a loop that exchanges with `config.server` over `transport`
    /// and publishes into `clock`.
    pub fn new(
        transport: T,
        config: UpstreamConfig,
        clock: ClockHandle,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        UpstreamSync {
            transport,
            config: UpstreamConfig {
                interval: config.interval.max(MIN_INTERVAL),
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            clock,
            metrics,
            state: SyncState::Idle,
            consecutive_failures: 0,
        }
    }

    /// The loop's configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// The clock state this loop publishes into.
    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    /// Failures since the last successful exchange.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether no exchange is in flight.
    pub fn is_idle(&self) -> bool {
        self.state == SyncState::Idle
    }

    /// Run forever: one exchange now, then one every `interval`.
    ///
    /// A cycle that overruns delays the next one rather than bunching them up.
    pub async fn run(mut self) {
        info!(
            "synchronizing to {} every {:?}",
            self.config.server, self.config.interval
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = self.sync_once().await;
        }
    }

    /// Perform one exchange and apply its outcome to the clock state.
    pub async fn sync_once(&mut self) -> Result<SyncSample, ExchangeError> {
        let result = match tokio::time::timeout(self.config.timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout),
        };
        self.state = SyncState::Idle;
        self.record(&result);
        result
    }

    async fn exchange(&mut self) -> Result<SyncSample, ExchangeError> {
        let t1 = unix_time::now_wire()?;
        self.state = SyncState::AwaitingReply { t1 };
        self.transport
            .send_to(&build_request_bytes(t1), self.config.server)
            .await?;

        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            let (len, src) = self.transport.recv_from(&mut buf).await?;
            let t4 = unix_time::now_wire()?;

            if src != self.config.server {
                debug!("ignoring datagram from {} while awaiting {}", src, self.config.server);
                continue;
            }

            let reply = parse_reply(&buf[..len])?;
            match validate_reply(&reply, t1, t4) {
                Err(ExchangeError::OriginMismatch) => {
                    debug!("ignoring reply from {} that does not answer T1", src);
                    continue;
                }
                other => return other,
            }
        }
    }

    fn record(&mut self, result: &Result<SyncSample, ExchangeError>) {
        match result {
            Ok(sample) => {
                self.consecutive_failures = 0;
                self.metrics.inc_upstream_successes();
                let precision = self.clock.snapshot().precision;
                let next = synchronized_state(sample, precision, self.config.server.ip());
                let stratum = next.stratum;
                let generation = self.clock.publish(next);
                debug!(
                    "published generation {}: stratum {} offset {} delay {}",
                    generation, stratum.0, sample.offset, sample.delay
                );
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.metrics.inc_upstream_failures();
                warn!(
                    "exchange with {} failed ({} in a row): {}",
                    self.config.server, self.consecutive_failures, e
                );
                if self.consecutive_failures >= self.config.failure_threshold
                    && self.clock.degrade()
                {
                    self.metrics.inc_degradations();
                    warn!("lost upstream {}, now unsynchronized", self.config.server);
                }
            }
        }
    }
}

/// The clock state to publish after a good exchange with `upstream`.
///
/// Stratum is one below the upstream's. Root delay adds the measured
/// round-trip delay (negative delays count as zero); root dispersion adds the
/// precision of both clocks plus the frequency tolerance over the round trip.
/// The reference identifier is the upstream's IPv4 address, or the first four
/// octets of an IPv6 address. An upstream at stratum 15 leaves nothing to
/// serve at a valid stratum, so the result is unsynchronized.
pub fn synchronized_state(sample: &SyncSample, precision: i8, upstream: IpAddr) -> ClockState {
    let stratum = sample.stratum.downstream();
    let delay = if sample.delay.is_negative() {
        TimeOffset::ZERO
    } else {
        sample.delay
    };

    let root_delay = sample.root_delay.saturating_add(ShortFormat::from(delay));
    let drift = 2f64.powi(precision.into())
        + 2f64.powi(sample.precision.into())
        + protocol::TOLERANCE * delay.as_seconds_f64();
    let root_dispersion = sample
        .root_dispersion
        .saturating_add(ShortFormat::from_seconds_f64(drift));

    let reference_id = match upstream {
        IpAddr::V4(addr) => ReferenceIdentifier::from_ipv4(addr),
        IpAddr::V6(addr) => {
            let o = addr.octets();
            ReferenceIdentifier([o[0], o[1], o[2], o[3]])
        }
    };

    let (status, leap_indicator) = if stratum < Stratum::MAX {
        (SyncStatus::Synchronized, sample.leap_indicator)
    } else {
        (SyncStatus::Unsynchronized, LeapIndicator::Unknown)
    };

    ClockState {
        status,
        leap_indicator,
        stratum,
        precision,
        root_delay,
        root_dispersion,
        reference_id,
        reference_timestamp: sample.t4,
        offset: sample.offset,
        delay: sample.delay,
        generation: 0,
    }
}
