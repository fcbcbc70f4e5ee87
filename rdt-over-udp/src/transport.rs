//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between the protocol state machines and the
//! network: it moves opaque byte datagrams and knows nothing about frames.
//! [`UdpTransport`] is the production implementation, a thin wrapper around
//! `tokio::net::UdpSocket`.  Tests substitute in-memory transports with
//! scripted loss.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

/// Maximum UDP payload size; the receive buffer is always this large.
pub const MAX_DATAGRAM: usize = 65_535;

/// Unrecoverable transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// `true` for errors that end one exchange but leave the socket usable.
    ///
    /// An unconnected UDP socket reports an ICMP port-unreachable from an
    /// earlier send as `ConnectionReset` (Windows) or `ConnectionRefused`
    /// (Linux) on a later receive.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
            ),
        }
    }
}

/// One received datagram and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub from: SocketAddr,
}

/// Unreliable, unordered datagram delivery.
///
/// All methods take `&self` so one transport can serve both directions of a
/// single transfer.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send `bytes` as a single datagram to `dest`.
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError>;

    /// Receive the next datagram, or `None` if `timeout` elapses first.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Datagram>, TransportError>;

    /// Receive the next datagram, waiting as long as it takes.
    async fn recv(&self) -> Result<Datagram, TransportError>;
}

/// UDP implementation of [`Transport`].
pub struct UdpTransport {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    /// Receive buffer, allocated once and reused for every datagram.
    recv_buf: Mutex<Vec<u8>>,
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, TransportError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            recv_buf: Mutex::new(vec![0u8; MAX_DATAGRAM]),
        })
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        let n = self.inner.send_to(bytes, dest).await?;
        if n != bytes.len() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {n} of {} bytes", bytes.len()),
            )));
        }
        Ok(())
    }

    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Datagram>, TransportError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn recv(&self) -> Result<Datagram, TransportError> {
        let mut buf = self.recv_buf.lock().await;
        let (n, from) = self.inner.recv_from(&mut buf[..]).await?;
        Ok(Datagram {
            bytes: buf[..n].to_vec(),
            from,
        })
    }
}
