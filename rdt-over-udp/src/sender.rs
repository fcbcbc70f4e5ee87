//! Outbound stop-and-wait driver.
//!
//! [`Sender`] owns the transport, the peer address and the alternating
//! sequence number.  For each record it builds and encodes one frame, then
//! runs the [`crate::state`] machine: the machine decides, the sender does
//! the I/O.
//!
//! # Stop-and-Wait contract
//! - At most **one** frame is in flight at any moment.
//! - A retransmission sends the stored frame byte-for-byte; it is never
//!   re-encoded.
//! - On ACK: flip the sequence number (0, 1, 0, 1, ...).
//! - On NACK, corrupt reply, transient receive error or timeout: retransmit until the retry budget
//!   runs out, then fail the record.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::checksum;
use crate::config::SenderConfig;
use crate::packet::{Packet, PacketError, DATA_CAPACITY, END_OF_STREAM};
use crate::state::{transition, SenderAction, SenderEvent, SenderState};
use crate::stream::Source;
use crate::transport::{Transport, TransportError};

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// The frame for the record currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// Sequence number carried by `frame`.
    pub seqnum: u32,
    /// The encoded frame, sent unchanged on every attempt.
    pub frame: Vec<u8>,
    /// How many times `frame` has been transmitted.
    pub tx_count: u32,
}

/// Outcome of one delivered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordReport {
    pub seqnum: u32,
    /// Transmissions it took, first send included.
    pub transmissions: u32,
    /// Payload bytes actually sent (after truncation).
    pub payload_len: usize,
}

/// Totals for a whole transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub records: u64,
    pub transmissions: u64,
    pub bytes: u64,
}

impl TransferSummary {
    fn record(&mut self, report: &RecordReport) {
        self.records += 1;
        self.transmissions += u64::from(report.transmissions);
        self.bytes += report.payload_len as u64;
    }

    pub fn retransmissions(&self) -> u64 {
        self.transmissions - self.records
    }
}

/// Errors that end a transfer.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("record source failed: {0}")]
    Source(#[from] io::Error),
    #[error("cannot build frame: {0}")]
    Packet(#[from] PacketError),
    #[error("record seq={seqnum} not acknowledged after {attempts} transmissions")]
    MaxRetriesExceeded { seqnum: u32, attempts: u32 },
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Stop-and-wait send side of one transfer.
#[derive(Debug)]
pub struct Sender<T> {
    transport: T,
    peer: SocketAddr,
    config: SenderConfig,
    /// Sequence number for the next record; always 0 or 1.
    next_seq: u32,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, peer: SocketAddr, config: SenderConfig) -> Self {
        Self {
            transport,
            peer,
            config,
            next_seq: 0,
        }
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Deliver one record, retransmitting as needed.
    ///
    /// Records longer than [`DATA_CAPACITY`] are truncated.  Returns
    /// [`SendError::MaxRetriesExceeded`] once the retry budget is spent;
    /// transport failures propagate immediately.
    pub async fn send_record(&mut self, record: &[u8]) -> Result<RecordReport, SendError> {
        let payload = if record.len() > DATA_CAPACITY {
            log::warn!(
                "[rdt:send] record of {} bytes truncated to {DATA_CAPACITY}",
                record.len()
            );
            &record[..DATA_CAPACITY]
        } else {
            record
        };

        let packet = Packet::data(self.next_seq, payload)?;
        log::trace!("[rdt:send] built {packet}");
        let mut entry = RetransmitEntry {
            seqnum: packet.seqnum(),
            frame: packet.encode()?,
            tx_count: 0,
        };

        let mut state = SenderState::start();
        let mut action = state.action();
        loop {
            let event = match action {
                SenderAction::Transmit => {
                    self.transport.send_to(&entry.frame, self.peer).await?;
                    entry.tx_count += 1;
                    log::debug!(
                        "[rdt:send] → DATA seq={} len={} tx={}",
                        entry.seqnum,
                        payload.len(),
                        entry.tx_count
                    );
                    SenderEvent::Transmitted
                }
                SenderAction::AwaitReply => self.await_reply(entry.seqnum).await?,
                SenderAction::Complete => {
                    self.next_seq ^= 1;
                    return Ok(RecordReport {
                        seqnum: entry.seqnum,
                        transmissions: entry.tx_count,
                        payload_len: payload.len(),
                    });
                }
                SenderAction::GiveUp => {
                    log::error!(
                        "[rdt:send] giving up on seq={} after {} transmissions",
                        entry.seqnum,
                        entry.tx_count
                    );
                    return Err(SendError::MaxRetriesExceeded {
                        seqnum: entry.seqnum,
                        attempts: entry.tx_count,
                    });
                }
            };
            (state, action) = transition(state, event, self.config.max_retries);
            log::trace!("[rdt:send] {event:?} → {state}");
        }
    }

    /// Send every record from `source`, then the end-of-stream sentinel.
    ///
    /// Stops at the first failed record without sending the sentinel.
    pub async fn send_stream<S: Source>(
        &mut self,
        source: &mut S,
    ) -> Result<TransferSummary, SendError> {
        let mut summary = TransferSummary::default();
        while let Some(record) = source.next_record().await? {
            let report = self.send_record(&record).await?;
            summary.record(&report);
        }
        self.finish().await?;
        log::info!(
            "[rdt:send] transfer complete: {} records, {} bytes, {} retransmissions",
            summary.records,
            summary.bytes,
            summary.retransmissions()
        );
        Ok(summary)
    }

    /// Send the 1-byte end-of-stream datagram.  It is not acknowledged.
    pub async fn finish(&self) -> Result<(), SendError> {
        self.transport.send_to(&[END_OF_STREAM], self.peer).await?;
        log::debug!("[rdt:send] → END_OF_STREAM");
        Ok(())
    }

    /// Wait up to the ack timeout and turn whatever happens into an event.
    ///
    /// A transient receive error counts as a negative reply; any other
    /// transport error ends the transfer.
    async fn await_reply(&self, seqnum: u32) -> Result<SenderEvent, SendError> {
        match self.transport.recv_timeout(self.config.ack_timeout).await {
            Ok(Some(dg)) => Ok(classify_reply(&dg.bytes, seqnum)),
            Ok(None) => {
                log::warn!("[rdt:send] timeout waiting for ACK seq={seqnum}");
                Ok(SenderEvent::TimedOut)
            }
            Err(e) if e.is_transient() => {
                log::warn!("[rdt:send] receive failed waiting for ACK seq={seqnum}: {e}");
                Ok(SenderEvent::Nacked)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Classify a reply datagram to the frame carrying `seqnum`.
///
/// Only a well-formed, uncorrupted ACK for `seqnum` counts as
/// [`SenderEvent::Acked`]; any other valid packet is a negative
/// acknowledgment.
pub fn classify_reply(bytes: &[u8], seqnum: u32) -> SenderEvent {
    let pkt = match Packet::decode(bytes) {
        Ok(pkt) => pkt,
        Err(e) => {
            log::warn!("[rdt:send] undecodable reply: {e}");
            return SenderEvent::Corrupt;
        }
    };
    if checksum::is_corrupt(&pkt) {
        return SenderEvent::Corrupt;
    }
    if pkt.is_ack() && pkt.seqnum() == seqnum {
        log::debug!("[rdt:send] ← ACK seq={seqnum}");
        SenderEvent::Acked
    } else {
        log::warn!(
            "[rdt:send] ← {:?} seq={} while expecting ACK seq={seqnum}",
            pkt.polarity(),
            pkt.seqnum()
        );
        SenderEvent::Nacked
    }
}
