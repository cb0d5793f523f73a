//! The datagram primitives the server and the upstream loop are written against.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Send and receive whole datagrams.
///
/// Implemented for [`tokio::net::UdpSocket`]; tests substitute in-memory
/// transports. Both methods take `&self` so one transport can be shared
/// between the receive loop and the per-datagram reply tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `buf` as one datagram to `target`.
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram into `buf`, returning its length and source.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// The local address, if the transport has one.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Transport for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}
