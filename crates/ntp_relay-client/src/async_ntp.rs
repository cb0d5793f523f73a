// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! One-shot async exchange with an upstream server over Tokio.
//!
//! These functions must be called from within a Tokio runtime context.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! let sample = ntp_client::async_ntp::request("192.0.2.1:123").await?;
//! println!("Offset: {:.6} seconds", sample.offset_seconds());
//! # Ok(())
//! # }
//! ```

use log::debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket};

use ntp_proto::unix_time;

use crate::error::ExchangeError;
use crate::exchange::{SyncSample, build_request_bytes, parse_reply, validate_reply};

/// Receive buffer size; large enough for any reply we accept plus slack.
const RECV_BUF_LEN: usize = 1024;

/// Select the wildcard bind address matching the target's address family.
pub(crate) fn bind_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

/// Query `addr` with a 5 second timeout.
pub async fn request<A: ToSocketAddrs>(addr: A) -> io::Result<SyncSample> {
    request_with_timeout(addr, Duration::from_secs(5)).await
}

/// Query `addr`, giving up after `timeout`.
///
/// Sends one version-4 client request and waits for the reply that answers
/// it. Datagrams from other sources, and replies whose origin timestamp does
/// not echo our request, are skipped rather than treated as failures.
pub async fn request_with_timeout<A: ToSocketAddrs>(
    addr: A,
    timeout: Duration,
) -> io::Result<SyncSample> {
    tokio::time::timeout(timeout, request_inner(addr))
        .await
        .map_err(|_| io::Error::from(ExchangeError::Timeout))?
}

async fn request_inner<A: ToSocketAddrs>(addr: A) -> io::Result<SyncSample> {
    let target = tokio::net::lookup_host(addr)
        .await?
        .next()
        .ok_or(ExchangeError::NoAddresses)?;

    let sock = UdpSocket::bind(bind_addr_for(&target)).await?;

    let t1 = unix_time::now_wire().map_err(ExchangeError::from)?;
    let sz = sock.send_to(&build_request_bytes(t1), target).await?;
    debug!("sent {} bytes to {} from {:?}", sz, target, sock.local_addr());

    let mut recv_buf = [0u8; RECV_BUF_LEN];
    loop {
        let (len, src) = sock.recv_from(&mut recv_buf).await?;
        let t4 = unix_time::now_wire().map_err(ExchangeError::from)?;
        debug!("recv: {} bytes from {}", len, src);

        if src.ip() != target.ip() {
            debug!("ignoring datagram from unexpected source {}", src);
            continue;
        }

        let reply = parse_reply(&recv_buf[..len])?;
        match validate_reply(&reply, t1, t4) {
            Err(ExchangeError::OriginMismatch) => {
                debug!("ignoring stale reply from {}", src);
                continue;
            }
            other => return other.map_err(io::Error::from),
        }
    }
}
