// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers for server integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ntp_server::protocol::{
    self, ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, ReferenceIdentifier,
    Stratum, ToBytes, Version,
};
use ntp_server::server::NtpServerBuilder;
use ntp_server::server_common::{ClockHandle, ServerMetrics};
use ntp_server::unix_time;
use tokio::net::UdpSocket;

/// A server running in a background task.
pub(crate) struct TestServer {
    pub(crate) addr: SocketAddr,
    pub(crate) clock: ClockHandle,
    pub(crate) metrics: Arc<ServerMetrics>,
}

/// Spawn a server on an ephemeral loopback port.
///
/// The server runs until the tokio runtime is dropped.
pub(crate) async fn spawn_test_server(builder: NtpServerBuilder) -> TestServer {
    let server = builder
        .listen("127.0.0.1:0")
        .build()
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("failed to get local addr");
    let clock = server.clock().clone();
    let metrics = server.metrics().clone();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        clock,
        metrics,
    }
}

/// The transmit timestamp [`build_client_packet`] stamps its requests with.
pub(crate) const CLIENT_TRANSMIT: protocol::TimestampFormat = protocol::TimestampFormat {
    seconds: 0xE000_0000,
    fraction: 0x1234_5678,
};

/// Build a minimal valid version-4 client request (48 bytes).
pub(crate) fn build_client_packet() -> [u8; Packet::PACKED_SIZE_BYTES] {
    let packet = Packet {
        transmit_timestamp: CLIENT_TRANSMIT,
        ..Packet::default()
    };
    let mut buf = [0u8; Packet::PACKED_SIZE_BYTES];
    packet.to_bytes(&mut buf[..]).expect("failed to serialize");
    buf
}

/// Send a raw datagram to `addr` and wait for the reply.
///
/// Returns `None` if the server doesn't respond within the timeout.
pub(crate) async fn send_receive_raw(
    addr: SocketAddr,
    packet: &[u8],
    timeout: Duration,
) -> Option<Vec<u8>> {
    let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
    sock.send_to(packet, addr).await.expect("send failed");
    let mut buf = vec![0u8; 2048];
    match tokio::time::timeout(timeout, sock.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => {
            buf.truncate(len);
            Some(buf)
        }
        _ => None,
    }
}

/// Parse a standard-layout reply.
pub(crate) fn parse_response(buf: &[u8]) -> Packet {
    let (pkt, _) = Packet::from_bytes(buf).expect("failed to parse response");
    pkt
}

/// Spawn an upstream on loopback that answers its first `answers` requests
/// as a server at `stratum`, then falls silent.
#[allow(dead_code)]
pub(crate) async fn spawn_fake_upstream(stratum: u8, answers: usize) -> SocketAddr {
    let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = sock.local_addr().expect("failed to get local addr");
    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let mut answered = 0;
        loop {
            let Ok((len, src)) = sock.recv_from(&mut buf).await else {
                return;
            };
            if answered >= answers {
                continue;
            }
            let Ok((request, _)) = Packet::from_bytes(&buf[..len]) else {
                continue;
            };
            let now = unix_time::now_wire().expect("clock after 1900");
            let reply = Packet {
                leap_indicator: LeapIndicator::NoWarning,
                version: Version::V4,
                mode: Mode::Server,
                stratum: Stratum(stratum),
                precision: -20,
                reference_id: ReferenceIdentifier::GPS,
                reference_timestamp: now,
                origin_timestamp: request.transmit_timestamp,
                receive_timestamp: now,
                transmit_timestamp: now,
                ..Packet::default()
            };
            let mut out = [0u8; Packet::PACKED_SIZE_BYTES];
            reply.to_bytes(&mut out[..]).expect("failed to serialize");
            let _ = sock.send_to(&out, src).await;
            answered += 1;
        }
    });
    addr
}

/// Poll `condition` every 10 ms until it holds or `within` elapses.
#[allow(dead_code)]
pub(crate) async fn wait_for(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
