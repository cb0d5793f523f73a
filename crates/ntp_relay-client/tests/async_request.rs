use std::io;
use std::time::Duration;

use ntp_client::async_ntp::request_with_timeout;
use ntp_client::protocol::{
    LeapIndicator, Mode, Packet, ReferenceIdentifier, Stratum, TimeOffset, TimestampFormat, Version,
};
use ntp_proto::{Frame, WireVariant, decode, encode};
use tokio::net::UdpSocket;

/// Reply to one request as a stratum-1 server whose clock runs `skew` ahead.
fn answer(request: &[u8], skew: TimeOffset) -> Vec<u8> {
    let Ok(Frame::Standard(req)) = decode(request, WireVariant::Standard) else {
        panic!("fake upstream got a malformed request");
    };
    let now = ntp_proto::unix_time::now_wire().unwrap().wrapping_add_offset(skew);
    encode(&Frame::Standard(Packet {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::V4,
        mode: Mode::Server,
        stratum: Stratum::PRIMARY,
        reference_id: ReferenceIdentifier::GPS,
        reference_timestamp: now,
        origin_timestamp: req.transmit_timestamp,
        receive_timestamp: now,
        transmit_timestamp: now,
        ..Packet::default()
    }))
}

async fn fake_upstream() -> (UdpSocket, std::net::SocketAddr) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();
    (sock, addr)
}

#[tokio::test]
async fn measures_offset_of_skewed_server() {
    let (sock, addr) = fake_upstream().await;
    tokio::spawn(async move {
        let mut buf = [0u8; 128];
        let (len, src) = sock.recv_from(&mut buf).await.unwrap();
        let reply = answer(&buf[..len], TimeOffset::from_seconds_f64(3.0));
        sock.send_to(&reply, src).await.unwrap();
    });

    let sample = request_with_timeout(addr, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(sample.stratum, Stratum::PRIMARY);
    assert!((sample.offset_seconds() - 3.0).abs() < 0.5);
    assert!(sample.delay_seconds() >= -0.001);
}

#[tokio::test]
async fn stale_reply_is_skipped() {
    let (sock, addr) = fake_upstream().await;
    tokio::spawn(async move {
        let mut buf = [0u8; 128];
        let (len, src) = sock.recv_from(&mut buf).await.unwrap();

        // First a reply to some other request, then the real one.
        let mut stale = answer(&buf[..len], TimeOffset::ZERO);
        stale[24..32].copy_from_slice(&TimestampFormat::from_u64(42).to_u64().to_be_bytes());
        sock.send_to(&stale, src).await.unwrap();

        let reply = answer(&buf[..len], TimeOffset::ZERO);
        sock.send_to(&reply, src).await.unwrap();
    });

    let sample = request_with_timeout(addr, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(sample.offset_seconds().abs() < 0.5);
}

#[tokio::test]
async fn silent_server_times_out() {
    let (_sock, addr) = fake_upstream().await;
    let err = request_with_timeout(addr, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);
}
