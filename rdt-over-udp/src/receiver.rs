//! Inbound stop-and-wait driver with duplicate suppression.
//!
//! The [`Receiver`] handles everything that happens between a datagram
//! arriving and its payload landing in the [`Sink`]:
//! - Recognising the end-of-stream sentinel.
//! - Decoding and checksum-verifying data frames.
//! - Acknowledging every valid frame, duplicates included: an ack can be
//!   lost, and the sender only recovers by retransmitting.
//! - Delivering each sequence number once ([`crate::state::DedupState`]).
//!
//! Corrupt or undecodable frames are logged and neither delivered nor
//! acknowledged; the sender's timeout covers them.

use std::borrow::Cow;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::checksum;
use crate::config::ReceiverConfig;
use crate::packet::{Packet, PacketError, END_OF_STREAM};
use crate::simulator::Simulator;
use crate::state::{DedupState, Delivery};
use crate::stream::Sink;
use crate::transport::{Datagram, Transport, TransportError};

/// Why a datagram was thrown away without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Fewer than two bytes and not the sentinel.
    ShortDatagram,
    /// Could not be decoded as a frame.
    Malformed,
    /// Decoded, but a checksum disagreed.
    Corrupt,
}

/// What [`Receiver::handle_datagram`] did with one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The sender signalled the end of the transfer.
    EndOfStream,
    /// New payload was acknowledged and written to the sink.
    Delivered { seqnum: u32, len: usize },
    /// Retransmission of the last delivered frame: re-acknowledged only.
    Duplicate { seqnum: u32 },
    /// Discarded without a reply.
    Discarded(DiscardReason),
    /// Valid frame dropped on purpose by the fault simulator.
    Dropped { seqnum: u32 },
}

/// Counters for one received stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    pub delivered: u64,
    pub bytes: u64,
    pub duplicates: u64,
    pub discarded: u64,
    pub dropped: u64,
}

impl ReceiveSummary {
    fn record(&mut self, step: &Step) {
        match step {
            Step::EndOfStream => {}
            Step::Delivered { len, .. } => {
                self.delivered += 1;
                self.bytes += *len as u64;
            }
            Step::Duplicate { .. } => self.duplicates += 1,
            Step::Discarded(_) => self.discarded += 1,
            Step::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Errors that end a receive loop.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("sink write failed: {0}")]
    Sink(#[from] io::Error),
    #[error("cannot build ACK: {0}")]
    Packet(#[from] PacketError),
}

/// Receive side of one transfer.
#[derive(Debug)]
pub struct Receiver<T, K> {
    transport: T,
    sink: K,
    dedup: DedupState,
    fault: Option<Simulator>,
    /// Encoded ACK frames for seqnum 0 and 1, built on first use.
    acks: [Vec<u8>; 2],
}

impl<T: Transport, K: Sink> Receiver<T, K> {
    pub fn new(transport: T, sink: K, config: ReceiverConfig) -> Self {
        Self {
            transport,
            sink,
            dedup: DedupState::new(),
            fault: config.fault.map(Simulator::new),
            acks: [Vec::new(), Vec::new()],
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn dedup(&self) -> DedupState {
        self.dedup
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Receive until the end-of-stream sentinel arrives.
    ///
    /// Blocks indefinitely between datagrams.
    pub async fn run(&mut self) -> Result<ReceiveSummary, ReceiveError> {
        let mut summary = ReceiveSummary::default();
        loop {
            let dg = match self.transport.recv().await {
                Ok(dg) => dg,
                Err(e) if e.is_transient() => {
                    log::warn!("[rdt:recv] receive failed, still listening: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let step = self.handle_datagram(dg).await?;
            summary.record(&step);
            if step == Step::EndOfStream {
                log::info!(
                    "[rdt:recv] transmission complete: {} delivered ({} bytes), {} duplicates, {} discarded, {} dropped",
                    summary.delivered,
                    summary.bytes,
                    summary.duplicates,
                    summary.discarded,
                    summary.dropped
                );
                return Ok(summary);
            }
        }
    }

    async fn send_ack(&mut self, seqnum: u32, to: SocketAddr) -> Result<(), ReceiveError> {
        let slot = seqnum as usize;
        let frame = if slot < self.acks.len() {
            if self.acks[slot].is_empty() {
                self.acks[slot] = Packet::ack(seqnum).encode()?;
            }
            Cow::Borrowed(self.acks[slot].as_slice())
        } else {
            // Checksums held, but the sender never uses this seqnum.
            Cow::Owned(Packet::ack(seqnum).encode()?)
        };
        self.transport.send_to(&frame, to).await?;
        log::debug!("[rdt:recv] → ACK seq={seqnum}");
        Ok(())
    }

    /// Process one inbound datagram.
    pub async fn handle_datagram(&mut self, dg: Datagram) -> Result<Step, ReceiveError> {
        log::debug!("[rdt:recv] ← {} bytes from {}", dg.bytes.len(), dg.from);

        match dg.bytes.as_slice() {
            [END_OF_STREAM] => return Ok(Step::EndOfStream),
            [] | [_] => {
                log::warn!("[rdt:recv] short datagram {:02x?} ignored", dg.bytes);
                return Ok(Step::Discarded(DiscardReason::ShortDatagram));
            }
            _ => {}
        }

        let pkt = match Packet::decode(&dg.bytes) {
            Ok(pkt) => pkt,
            Err(e) => {
                log::warn!("[rdt:recv] discarding frame from {}: {e}", dg.from);
                return Ok(Step::Discarded(DiscardReason::Malformed));
            }
        };
        log::trace!("[rdt:recv] {pkt}");

        if let Err(e) = checksum::verify(&pkt) {
            log::warn!("[rdt:recv] discarding seq={}: {e}", pkt.seqnum());
            return Ok(Step::Discarded(DiscardReason::Corrupt));
        }

        let seqnum = pkt.seqnum();
        if let Some(sim) = self.fault.as_mut() {
            if sim.should_drop() {
                log::info!("[rdt:recv] simulator dropped seq={seqnum}");
                return Ok(Step::Dropped { seqnum });
            }
        }

        self.send_ack(seqnum, dg.from).await?;

        match self.dedup.classify(seqnum) {
            Delivery::New => {
                let payload = pkt.payload();
                self.sink.append(payload).await?;
                self.dedup.commit(seqnum);
                log::debug!("[rdt:recv] delivered seq={seqnum} len={}", payload.len());
                Ok(Step::Delivered {
                    seqnum,
                    len: payload.len(),
                })
            }
            Delivery::Duplicate => {
                log::info!("[rdt:recv] duplicate seq={seqnum} re-acknowledged, payload discarded");
                Ok(Step::Duplicate { seqnum })
            }
        }
    }
}
