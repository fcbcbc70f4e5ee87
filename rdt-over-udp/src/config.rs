//! Explicit protocol configuration.
//!
//! Everything tunable is a plain value handed to [`crate::sender::Sender`]
//! or [`crate::receiver::Receiver`] at construction; there are no
//! process-wide knobs.  The CLI fills these in from flags.

use std::time::Duration;

use crate::simulator::SimulatorConfig;

/// Well-known port the server listens on unless told otherwise.
pub const SERVER_PORT: u16 = 5432;

/// Sender-side parameters.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// How long to wait for an acknowledgment before retransmitting.
    pub ack_timeout: Duration,
    /// Retry budget per record, counted in transmissions with the first
    /// send included: after this many unacknowledged sends the record fails.
    pub max_retries: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(250),
            max_retries: 10,
        }
    }
}

/// Receiver-side parameters.
#[derive(Debug, Clone, Default)]
pub struct ReceiverConfig {
    /// Fault injection on inbound data frames; `None` in normal operation.
    pub fault: Option<SimulatorConfig>,
}
