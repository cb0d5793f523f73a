// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Time server on the Tokio runtime.
//!
//! The serving loop receives datagrams and hands each one to its own task,
//! which takes one clock snapshot, runs the request pipeline and sends the
//! reply. When an upstream is configured, its sync loop runs as a sibling
//! task and publishes into the same clock state.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use std::time::Duration;
//! use ntp_server::server::NtpServer;
//!
//! let server = NtpServer::builder()
//!     .listen("0.0.0.0:123")
//!     .upstream("10.10.10.10:123")
//!     .sync_interval(Duration::from_secs(600))
//!     .build()
//!     .await?;
//!
//! server.run().await
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, NtpServerError};
use crate::protocol::TimestampFormat;
use crate::server_common::{
    ClockHandle, ClockState, HandleResult, LocalReference, RelayConfig, ServerMetrics,
    handle_request,
};
use crate::transport::Transport;
use crate::unix_time;
use crate::upstream::{UpstreamConfig, UpstreamSync};

const RECV_BUF_LEN: usize = 2048;

/// Builder for configuring and creating an [`NtpServer`].
#[derive(Clone, Debug)]
pub struct NtpServerBuilder {
    listen_addr: String,
    precision: i8,
    local_reference: Option<LocalReference>,
    metrics: Option<Arc<ServerMetrics>>,
    upstream: Option<String>,
    sync_interval: Duration,
    sync_timeout: Duration,
    failure_threshold: u32,
}

impl NtpServerBuilder {
    fn new() -> Self {
        Self::from_config(&RelayConfig::default())
    }

    /// Start from a parsed [`RelayConfig`].
    pub fn from_config(config: &RelayConfig) -> Self {
        NtpServerBuilder {
            listen_addr: config.listen.clone(),
            precision: config.precision,
            local_reference: config.local_reference,
            metrics: None,
            upstream: config.upstream.clone(),
            sync_interval: config.sync_interval,
            sync_timeout: config.sync_timeout,
            failure_threshold: config.failure_threshold,
        }
    }

    /// Set the listen address (default: `"0.0.0.0:123"`).
    pub fn listen(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the advertised precision in log2 seconds (default: -20).
    pub fn precision(mut self, precision: i8) -> Self {
        self.precision = precision;
        self
    }

    /// Serve the local clock as a reference. Ignored when an upstream is set.
    pub fn local_reference(mut self, reference: LocalReference) -> Self {
        self.local_reference = Some(reference);
        self
    }

    /// Attach a shared metrics instance. One is created if none is given.
    pub fn metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Synchronize to the server at `addr` (`host:port`).
    pub fn upstream(mut self, addr: impl Into<String>) -> Self {
        self.upstream = Some(addr.into());
        self
    }

    /// Set the time between upstream exchanges (default: 3600 s).
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Set the bound on one upstream exchange (default: 5 s).
    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Set how many consecutive upstream failures degrade the clock state
    /// (default: 3).
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Build the server. Binds the listen address and, with an upstream,
    /// resolves it and binds an ephemeral socket for the sync loop.
    pub async fn build(self) -> io::Result<NtpServer> {
        self.validate()?;
        let sock = UdpSocket::bind(&self.listen_addr).await?;
        info!("listening on {}", sock.local_addr()?);

        let upstream = match &self.upstream {
            None => None,
            Some(addr) => {
                let target = tokio::net::lookup_host(addr.as_str())
                    .await?
                    .next()
                    .ok_or_else(|| {
                        NtpServerError::from(ConfigError::UnresolvedAddress(addr.clone()))
                    })?;
                let upstream_sock = UdpSocket::bind(wildcard_for(&target)).await?;
                Some((upstream_sock, target))
            }
        };

        Ok(self.assemble(sock, upstream))
    }

    /// Build the server over caller-supplied transports.
    ///
    /// The upstream, if configured, must be a literal socket address, and
    /// `upstream` must then supply the transport the sync loop uses.
    pub fn build_with_transports<T: Transport>(
        self,
        serve: T,
        upstream: Option<T>,
    ) -> io::Result<NtpServer<T>> {
        self.validate()?;
        let upstream = match (&self.upstream, upstream) {
            (None, _) => None,
            (Some(addr), Some(transport)) => {
                let target = addr.parse::<SocketAddr>().map_err(|_| {
                    NtpServerError::from(ConfigError::InvalidValue {
                        key: "upstream",
                        value: addr.clone(),
                        reason: "expected a socket address",
                    })
                })?;
                Some((transport, target))
            }
            (Some(addr), None) => {
                return Err(NtpServerError::from(ConfigError::InvalidValue {
                    key: "upstream",
                    value: addr.clone(),
                    reason: "no upstream transport supplied",
                })
                .into());
            }
        };
        Ok(self.assemble(serve, upstream))
    }

    fn validate(&self) -> Result<(), NtpServerError> {
        if self.upstream.is_some() && self.sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "sync_interval",
                value: format!("{:?}", self.sync_interval),
                reason: "expected a non-zero interval",
            }
            .into());
        }
        Ok(())
    }

    fn initial_state(&self) -> ClockState {
        match (&self.upstream, self.local_reference) {
            (None, Some(reference)) => ClockState::local_reference(
                self.precision,
                reference,
                unix_time::now_wire().unwrap_or(TimestampFormat::ZERO),
            ),
            _ => ClockState::unsynchronized(self.precision),
        }
    }

    fn assemble<T: Transport>(self, serve: T, upstream: Option<(T, SocketAddr)>) -> NtpServer<T> {
        let clock = ClockHandle::new(self.initial_state());
        let metrics = self.metrics.unwrap_or_default();
        let upstream = upstream.map(|(transport, server)| {
            UpstreamSync::new(
                transport,
                UpstreamConfig {
                    server,
                    interval: self.sync_interval,
                    timeout: self.sync_timeout,
                    failure_threshold: self.failure_threshold,
                },
                clock.clone(),
                metrics.clone(),
            )
        });
        NtpServer {
            transport: Arc::new(serve),
            clock,
            metrics,
            upstream,
        }
    }
}

fn wildcard_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

/// A time server that responds to client requests.
///
/// Created via [`NtpServer::builder()`]. Call [`run()`](NtpServer::run) to
/// start serving.
pub struct NtpServer<T: Transport = UdpSocket> {
    transport: Arc<T>,
    clock: ClockHandle,
    metrics: Arc<ServerMetrics>,
    upstream: Option<UpstreamSync<T>>,
}

impl NtpServer {
    /// Create a builder for configuring the server.
    pub fn builder() -> NtpServerBuilder {
        NtpServerBuilder::new()
    }
}

impl<T: Transport> NtpServer<T> {
    /// The shared clock state. Publishing into it changes the next reply.
    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    /// The metrics instance shared by the serving and sync loops.
    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// The local address of the serving transport.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The upstream server, if one is configured.
    pub fn upstream_addr(&self) -> Option<SocketAddr> {
        self.upstream.as_ref().map(|u| u.config().server)
    }

    /// Serve requests until the receive primitive fails.
    ///
    /// Per-datagram failures are counted and logged and never end the loop.
    /// The upstream sync task, if any, is stopped when this returns or is
    /// dropped. Use `tokio::select!` with a shutdown signal to stop the
    /// server.
    pub async fn run(self) -> io::Result<()> {
        let NtpServer {
            transport,
            clock,
            metrics,
            upstream,
        } = self;

        let _upstream_task = upstream.map(|sync| AbortOnDrop(tokio::spawn(sync.run())));

        let mut recv_buf = [0u8; RECV_BUF_LEN];
        loop {
            let (recv_len, src_addr) = match transport.recv_from(&mut recv_buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("receive failed, stopping: {}", e);
                    return Err(e);
                }
            };

            let datagram = recv_buf[..recv_len].to_vec();
            let transport = transport.clone();
            let clock = clock.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let snapshot = clock.snapshot();
                match handle_request(&datagram, src_addr, &snapshot, &metrics) {
                    HandleResult::Response(reply) => {
                        match transport.send_to(&reply, src_addr).await {
                            Ok(_) => metrics.inc_responses_sent(),
                            Err(e) => {
                                metrics.inc_send_failures();
                                warn!("send to {} failed: {}", src_addr, e);
                            }
                        }
                    }
                    HandleResult::Drop(reason) => {
                        debug!("dropped packet from {}: {:?}", src_addr, reason);
                    }
                }
            });
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ReferenceIdentifier, Stratum};
    use crate::server_common::SyncStatus;

    #[test]
    fn test_builder_defaults() {
        let builder = NtpServer::builder();
        assert_eq!(builder.listen_addr, "0.0.0.0:123");
        assert_eq!(builder.precision, -20);
        assert!(builder.upstream.is_none());
        assert!(builder.local_reference.is_none());
        assert!(builder.metrics.is_none());
        assert_eq!(builder.sync_interval, Duration::from_secs(3600));
        assert_eq!(builder.sync_timeout, Duration::from_secs(5));
        assert_eq!(builder.failure_threshold, 3);
    }

    #[test]
    fn test_builder_setters() {
        let builder = NtpServer::builder()
            .listen("127.0.0.1:1234")
            .precision(-18)
            .upstream("192.0.2.1:123")
            .sync_interval(Duration::from_secs(16))
            .sync_timeout(Duration::from_millis(500))
            .failure_threshold(7);
        assert_eq!(builder.listen_addr, "127.0.0.1:1234");
        assert_eq!(builder.precision, -18);
        assert_eq!(builder.upstream.as_deref(), Some("192.0.2.1:123"));
        assert_eq!(builder.sync_interval, Duration::from_secs(16));
        assert_eq!(builder.sync_timeout, Duration::from_millis(500));
        assert_eq!(builder.failure_threshold, 7);
    }

    #[test]
    fn test_builder_from_config() {
        let config = RelayConfig::from_conf_str("ntpserverip:10.10.10.10\nupdatefrequency:60\n")
            .unwrap();
        let builder = NtpServerBuilder::from_config(&config);
        assert_eq!(builder.upstream.as_deref(), Some("10.10.10.10:123"));
        assert_eq!(builder.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_initial_state() {
        let state = NtpServer::builder().initial_state();
        assert_eq!(state.status, SyncStatus::Unsynchronized);

        let state = NtpServer::builder()
            .local_reference(LocalReference::locl(3))
            .initial_state();
        assert_eq!(state.status, SyncStatus::LocalReference);
        assert_eq!(state.stratum, Stratum(3));
        assert_eq!(state.reference_id, ReferenceIdentifier::LOCL);

        // An upstream overrides the local reference.
        let state = NtpServer::builder()
            .local_reference(LocalReference::locl(3))
            .upstream("192.0.2.1:123")
            .initial_state();
        assert_eq!(state.status, SyncStatus::Unsynchronized);
    }

    #[tokio::test]
    async fn test_build_with_transports() {
        let serve = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let up = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let metrics = Arc::new(ServerMetrics::new());
        let server = NtpServer::builder()
            .upstream("127.0.0.1:9")
            .metrics(metrics.clone())
            .build_with_transports(serve, Some(up))
            .unwrap();
        assert_eq!(server.upstream_addr(), Some("127.0.0.1:9".parse().unwrap()));
        assert!(Arc::ptr_eq(server.metrics(), &metrics));
        assert!(server.local_addr().unwrap().port() != 0);
    }

    #[tokio::test]
    async fn test_zero_sync_interval_rejected() {
        let serve = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let up = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let err = NtpServer::builder()
            .upstream("127.0.0.1:9")
            .sync_interval(Duration::ZERO)
            .build_with_transports(serve, Some(up))
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = NtpServer::builder()
            .listen("127.0.0.1:0")
            .upstream("127.0.0.1:9")
            .sync_interval(Duration::ZERO)
            .build()
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        // Without an upstream the interval is never used.
        let serve = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        assert!(
            NtpServer::builder()
                .sync_interval(Duration::ZERO)
                .build_with_transports(serve, None)
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_build_with_transports_rejects_bad_upstream() {
        let serve = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let err = NtpServer::builder()
            .upstream("ntp.invalid:123")
            .build_with_transports(serve, Some(UdpSocket::bind("127.0.0.1:0").await.unwrap()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let serve = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let err = NtpServer::builder()
            .upstream("127.0.0.1:9")
            .build_with_transports(serve, None)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
