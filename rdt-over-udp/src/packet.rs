//! Wire-format definitions for protocol frames.
//!
//! Every data or acknowledgment datagram exchanged between peers is a
//! [`Packet`].  This module is responsible for:
//! - Defining the fixed-size on-wire binary layout.
//! - Building packets with both checksums sealed in the required order.
//! - Serialising a [`Packet`] into a frame ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for truncated or malformed input.
//!
//! Decoding does **not** verify checksums; that verdict belongs to
//! [`crate::checksum`] and is taken by the sender and receiver.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  Every frame is exactly
//! [`FRAME_LEN`] bytes; the payload region is zero-padded after `data_len`.
//!
//! ```text
//!  offset  size  field
//!  ------  ----  -------------------------------------------------------
//!       0     1  ack           polarity: 0 = ACK, 1 = NACK
//!       1     4  seqnum        alternating sequence number (0 or 1)
//!       5     4  data_len      meaningful bytes in `data`
//!       9     4  hdr_checksum  checksum over the header (see below)
//!      13     4  tag           diagnostic marker, always "ZZZZ"
//!      17     4  data_checksum checksum over data[..data_len]
//!      21     C  data          payload, zero padded
//! ```
//!
//! The header checksum covers `ack`, `seqnum`, `data_len`, `tag` and
//! `data_checksum`, so the data checksum has to be sealed first.
//!
//! The end of a transfer is signalled by a lone [`END_OF_STREAM`] byte sent
//! as its own datagram, outside this framing.

use std::fmt;

use thiserror::Error;

use crate::checksum::{self, OverrunError};

/// Byte length of the fixed header on the wire.
pub const HEADER_LEN: usize = 21;

/// Payload capacity `C` of every frame.
///
/// Chosen so that [`FRAME_LEN`] is 65 507 bytes, the largest UDP payload an
/// IPv4 datagram can carry.
pub const DATA_CAPACITY: usize = 65_486;

/// Total size of an encoded frame.
pub const FRAME_LEN: usize = HEADER_LEN + DATA_CAPACITY;

/// Sentinel byte sent as a 1-byte datagram to end a transfer.
pub const END_OF_STREAM: u8 = 0x02;

/// Marker written into every frame's `tag` field.
pub const TAG: [u8; 4] = *b"ZZZZ";

// Byte offsets of each field within the serialised header.
const OFF_ACK: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_DATA_LEN: usize = 5;
const OFF_HDR_CHECKSUM: usize = 9;
const OFF_TAG: usize = 13;
const OFF_DATA_CHECKSUM: usize = 17;

/// Value of the one-byte `ack` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Polarity {
    Ack = 0,
    Nack = 1,
}

impl Polarity {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(byte: u8) -> Result<Self, PacketError> {
        match byte {
            0 => Ok(Polarity::Ack),
            1 => Ok(Polarity::Nack),
            other => Err(PacketError::UnknownPolarity(other)),
        }
    }
}

/// What a packet means to the protocol.
///
/// Data frames and acknowledgments are distinct messages, but on the wire
/// both carry [`Polarity::Ack`]: the sender marks its data frames with the
/// same byte the receiver uses for a positive acknowledgment.  Direction
/// tells them apart: the sender only ever reads acknowledgments and the
/// receiver only ever reads data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Data,
    Ack,
}

impl MessageKind {
    /// Polarity byte this kind is encoded with.
    pub fn polarity(self) -> Polarity {
        match self {
            MessageKind::Data | MessageKind::Ack => Polarity::Ack,
        }
    }
}

/// A protocol frame with both checksums sealed.
///
/// Fields are in host byte order; [`Packet::encode`] converts to big-endian
/// on the wire and [`Packet::decode`] converts back.  There are no setters:
/// once `hdr_checksum` is computed nothing may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    polarity: Polarity,
    seqnum: u32,
    data_len: u32,
    hdr_checksum: u32,
    tag: [u8; 4],
    data_checksum: u32,
    /// Payload bytes.  Holds exactly `data_len` bytes for a well-formed
    /// packet; a decoded frame that claims more than [`DATA_CAPACITY`] keeps
    /// only what the frame holds.
    data: Vec<u8>,
}

impl Packet {
    /// Build a packet of the given kind and seal its checksums.
    ///
    /// Fails with [`PacketError::Overrun`] if `payload` is longer than
    /// [`DATA_CAPACITY`].
    pub fn new(kind: MessageKind, seqnum: u32, payload: Vec<u8>) -> Result<Self, PacketError> {
        Self::sealed(kind.polarity(), seqnum, payload)
    }

    /// A data frame carrying `payload`.
    pub fn data(seqnum: u32, payload: impl Into<Vec<u8>>) -> Result<Self, PacketError> {
        Self::new(MessageKind::Data, seqnum, payload.into())
    }

    /// An empty positive acknowledgment for `seqnum`.
    pub fn ack(seqnum: u32) -> Self {
        Self::empty(MessageKind::Ack.polarity(), seqnum)
    }

    /// An empty negative acknowledgment for `seqnum`.
    pub fn nack(seqnum: u32) -> Self {
        Self::empty(Polarity::Nack, seqnum)
    }

    fn empty(polarity: Polarity, seqnum: u32) -> Self {
        let mut pkt = Packet {
            polarity,
            seqnum,
            data_len: 0,
            hdr_checksum: 0,
            tag: TAG,
            data_checksum: 0,
            data: Vec::new(),
        };
        pkt.hdr_checksum = checksum::header_checksum(&pkt);
        pkt
    }

    fn sealed(polarity: Polarity, seqnum: u32, payload: Vec<u8>) -> Result<Self, PacketError> {
        if payload.len() > DATA_CAPACITY {
            return Err(PacketError::Overrun { len: payload.len() });
        }
        let mut pkt = Packet {
            polarity,
            seqnum,
            data_len: payload.len() as u32,
            hdr_checksum: 0,
            tag: TAG,
            data_checksum: 0,
            data: payload,
        };
        // Data checksum first: the header checksum covers its bytes.
        pkt.data_checksum = checksum::data_checksum(&pkt)?;
        pkt.hdr_checksum = checksum::header_checksum(&pkt);
        Ok(pkt)
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn seqnum(&self) -> u32 {
        self.seqnum
    }

    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    pub fn hdr_checksum(&self) -> u32 {
        self.hdr_checksum
    }

    pub fn tag(&self) -> &[u8; 4] {
        &self.tag
    }

    pub fn data_checksum(&self) -> u32 {
        self.data_checksum
    }

    /// `true` when the polarity byte is [`Polarity::Ack`].
    pub fn is_ack(&self) -> bool {
        self.polarity == Polarity::Ack
    }

    /// The meaningful payload bytes (at most `data_len`).
    pub fn payload(&self) -> &[u8] {
        let len = (self.data_len as usize).min(self.data.len());
        &self.data[..len]
    }

    /// Raw payload storage, for the checksum engine's bounds checks.
    pub(crate) fn data_region(&self) -> &[u8] {
        &self.data
    }

    /// Serialise this packet into a [`FRAME_LEN`]-byte frame.
    ///
    /// Fails with [`PacketError::Overrun`] if `data_len` exceeds
    /// [`DATA_CAPACITY`] or the bytes the packet actually holds.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let len = self.data_len as usize;
        if len > DATA_CAPACITY {
            return Err(PacketError::Overrun { len });
        }
        let payload = self.data.get(..len).ok_or(PacketError::Overrun { len })?;

        let mut buf = vec![0u8; FRAME_LEN];
        buf[OFF_ACK] = self.polarity.to_wire();
        put_u32(&mut buf, OFF_SEQ, self.seqnum);
        put_u32(&mut buf, OFF_DATA_LEN, self.data_len);
        put_u32(&mut buf, OFF_HDR_CHECKSUM, self.hdr_checksum);
        buf[OFF_TAG..OFF_TAG + 4].copy_from_slice(&self.tag);
        put_u32(&mut buf, OFF_DATA_CHECKSUM, self.data_checksum);
        buf[HEADER_LEN..HEADER_LEN + len].copy_from_slice(payload);

        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw frame.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`FRAME_LEN`], or
    /// - the `ack` byte is not a known [`Polarity`].
    ///
    /// Checksums are carried over as-is and not verified.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < FRAME_LEN {
            return Err(PacketError::Truncated { len: buf.len() });
        }

        let polarity = Polarity::from_wire(buf[OFF_ACK])?;
        let seqnum = get_u32(buf, OFF_SEQ);
        let data_len = get_u32(buf, OFF_DATA_LEN);
        let hdr_checksum = get_u32(buf, OFF_HDR_CHECKSUM);
        let tag = [
            buf[OFF_TAG],
            buf[OFF_TAG + 1],
            buf[OFF_TAG + 2],
            buf[OFF_TAG + 3],
        ];
        let data_checksum = get_u32(buf, OFF_DATA_CHECKSUM);

        let kept = (data_len as usize).min(DATA_CAPACITY);
        let data = buf[HEADER_LEN..HEADER_LEN + kept].to_vec();

        Ok(Packet {
            polarity,
            seqnum,
            data_len,
            hdr_checksum,
            tag,
            data_checksum,
            data,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} seq={} len={} hsum={} tag={} dsum={}",
            self.polarity,
            self.seqnum,
            self.data_len,
            self.hdr_checksum,
            String::from_utf8_lossy(&self.tag),
            self.data_checksum,
        )
    }
}

/// Write `value` big-endian into `buf[offset..offset + 4]`.
///
/// # Panics
///
/// Panics if `buf` is shorter than `offset + 4`.
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian `u32` from `buf[offset..offset + 4]`.
///
/// # Panics
///
/// Panics if `buf` is shorter than `offset + 4`.
pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Errors that can arise when building, encoding or decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than a full frame.
    #[error("truncated frame: {len} bytes, expected {}", FRAME_LEN)]
    Truncated { len: usize },
    /// Payload length beyond the frame's capacity.
    #[error("data length {len} exceeds capacity {}", DATA_CAPACITY)]
    Overrun { len: usize },
    /// `ack` byte is neither ACK nor NACK.
    #[error("unknown polarity byte {0:#04x}")]
    UnknownPolarity(u8),
}

impl From<OverrunError> for PacketError {
    fn from(e: OverrunError) -> Self {
        PacketError::Overrun { len: e.len as usize }
    }
}
