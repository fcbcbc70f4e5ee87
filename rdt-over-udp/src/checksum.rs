//! Header and payload checksums.
//!
//! Both checksums are a plain byte sum reduced modulo [`PRIME`], the largest
//! prime below 2^16.  They are computed independently so a receiver can tell
//! a damaged header from a damaged payload:
//!
//! ```text
//! hdr_checksum  = (ack + Σ seqnum + Σ data_len + Σ tag + Σ data_checksum) mod P
//! data_checksum = (Σ data[..data_len]) mod P        (0 for an empty payload)
//! ```
//!
//! Multi-byte fields contribute the sum of their big-endian bytes.  No I/O
//! happens here.

use thiserror::Error;

use crate::packet::{Packet, DATA_CAPACITY};

/// Modulus for both checksums.
pub const PRIME: u32 = 65_497;

/// `data_len` points past the packet's payload buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("data length {len} overruns the payload buffer")]
pub struct OverrunError {
    pub len: u32,
}

/// Which checksum disagreed with its embedded value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    #[error("header checksum mismatch: embedded {embedded}, computed {computed}")]
    Header { embedded: u32, computed: u32 },
    #[error("data checksum mismatch: embedded {embedded}, computed {computed}")]
    Data { embedded: u32, computed: u32 },
    #[error("data checksum unverifiable: {0}")]
    Overrun(#[from] OverrunError),
}

/// Sum of the unsigned values of `bytes`.
pub fn sum_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| u32::from(b)).sum()
}

/// Checksum over every header field except `hdr_checksum` itself.
pub fn header_checksum(pkt: &Packet) -> u32 {
    let sum = u32::from(pkt.polarity().to_wire())
        + sum_bytes(&pkt.seqnum().to_be_bytes())
        + sum_bytes(&pkt.data_len().to_be_bytes())
        + sum_bytes(pkt.tag())
        + sum_bytes(&pkt.data_checksum().to_be_bytes());
    sum % PRIME
}

/// Checksum over the first `data_len` payload bytes.
///
/// Returns `Ok(0)` for an empty payload.  Never reads out of bounds: a
/// `data_len` beyond [`DATA_CAPACITY`] or beyond the bytes the packet holds
/// is reported as [`OverrunError`].
pub fn data_checksum(pkt: &Packet) -> Result<u32, OverrunError> {
    let len = pkt.data_len();
    if len as usize > DATA_CAPACITY {
        return Err(OverrunError { len });
    }
    let data = pkt
        .data_region()
        .get(..len as usize)
        .ok_or(OverrunError { len })?;

    if data.is_empty() {
        return Ok(0);
    }
    Ok(sum_bytes(data) % PRIME)
}

/// Recompute both checksums and compare them with the embedded values.
///
/// The header is checked first; a packet with a bad header is reported as
/// [`Corruption::Header`] even if its payload is damaged too.
pub fn verify(pkt: &Packet) -> Result<(), Corruption> {
    let computed = header_checksum(pkt);
    if computed != pkt.hdr_checksum() {
        return Err(Corruption::Header {
            embedded: pkt.hdr_checksum(),
            computed,
        });
    }

    let computed = data_checksum(pkt)?;
    if computed != pkt.data_checksum() {
        return Err(Corruption::Data {
            embedded: pkt.data_checksum(),
            computed,
        });
    }
    Ok(())
}

/// `true` if either checksum disagrees.  Logs which one failed.
pub fn is_corrupt(pkt: &Packet) -> bool {
    match verify(pkt) {
        Ok(()) => false,
        Err(e) => {
            log::warn!("corrupt packet seq={}: {e}", pkt.seqnum());
            true
        }
    }
}
