//! In-memory transports shared by the integration tests.
//!
//! - [`ScriptedTransport`] replays a fixed list of replies and records every
//!   datagram sent through it.  An exhausted script behaves like a silent
//!   network: every bounded receive times out at once.  A scripted
//!   [`Reply::Error`] makes one receive fail.
//! - [`link`] builds two connected [`ChannelTransport`]s; either end can be
//!   told to lose its next N outbound datagrams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rdt_over_udp::{Datagram, Packet, Transport, TransportError};
use tokio::sync::mpsc;

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn frame(pkt: Packet) -> Vec<u8> {
    pkt.encode().expect("encode")
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// One scripted reply to a bounded receive.
#[derive(Debug, Clone)]
pub enum Reply {
    Bytes(Vec<u8>),
    Timeout,
    /// The receive fails with an I/O error of this kind.
    Error(io::ErrorKind),
}

#[derive(Debug)]
pub struct ScriptedTransport {
    peer: SocketAddr,
    script: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

impl ScriptedTransport {
    pub fn new(peer: SocketAddr, script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            peer,
            script: Mutex::new(script.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn silent(peer: SocketAddr) -> Self {
        Self::new(peer, Vec::new())
    }

    /// Every datagram sent so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().iter().map(|(b, _)| b.clone()).collect()
    }

    pub fn sent_to(&self) -> Vec<SocketAddr> {
        self.sent.lock().unwrap().iter().map(|(_, a)| *a).collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((bytes.to_vec(), dest));
        Ok(())
    }

    async fn recv_timeout(&self, _timeout: Duration) -> Result<Option<Datagram>, TransportError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Reply::Bytes(bytes)) => Ok(Some(Datagram {
                bytes,
                from: self.peer,
            })),
            Some(Reply::Error(kind)) => Err(TransportError::Io(io::Error::from(kind))),
            Some(Reply::Timeout) | None => Ok(None),
        }
    }

    async fn recv(&self) -> Result<Datagram, TransportError> {
        loop {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Reply::Bytes(bytes)) => {
                    return Ok(Datagram {
                        bytes,
                        from: self.peer,
                    })
                }
                Some(Reply::Error(kind)) => return Err(TransportError::Io(io::Error::from(kind))),
                Some(Reply::Timeout) => continue,
                None => {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "script exhausted",
                    )))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// One end of an in-memory datagram link.
#[derive(Debug)]
pub struct ChannelTransport {
    pub local_addr: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    lose_next: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
    lost: AtomicUsize,
}

impl ChannelTransport {
    /// Silently lose the next `n` datagrams sent from this end.
    pub fn lose_next(&self, n: usize) {
        self.lose_next.store(n, Ordering::SeqCst);
    }

    /// Every datagram this end tried to send, lost ones included.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn lost(&self) -> usize {
        self.lost.load(Ordering::SeqCst)
    }
}

/// Two connected endpoints: whatever one sends, the other receives.
pub fn link(a_addr: SocketAddr, b_addr: SocketAddr) -> (ChannelTransport, ChannelTransport) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let end = |local_addr: SocketAddr,
               tx: mpsc::UnboundedSender<Datagram>,
               rx: mpsc::UnboundedReceiver<Datagram>| ChannelTransport {
        local_addr,
        tx,
        rx: tokio::sync::Mutex::new(rx),
        lose_next: AtomicUsize::new(0),
        sent: Mutex::new(Vec::new()),
        lost: AtomicUsize::new(0),
    };
    (end(a_addr, a_tx, a_rx), end(b_addr, b_tx, b_rx))
}

impl Transport for ChannelTransport {
    async fn send_to(&self, bytes: &[u8], _dest: SocketAddr) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(bytes.to_vec());
        let lose = self
            .lose_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lose {
            self.lost.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        // A closed peer is just a lossy network.
        let _ = self.tx.send(Datagram {
            bytes: bytes.to_vec(),
            from: self.local_addr,
        });
        Ok(())
    }

    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Datagram>, TransportError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn recv(&self) -> Result<Datagram, TransportError> {
        self.rx.lock().await.recv().await.ok_or_else(|| {
            TransportError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "link closed"))
        })
    }
}
