//! Finite-state-machine types for both ends of a transfer.
//!
//! The sender side is an explicit [`SenderState`] plus a pure
//! [`transition`] function; [`crate::sender`] only performs the I/O that the
//! returned [`SenderAction`] asks for.  The receiver side is the
//! [`DedupState`] duplicate classifier used by [`crate::receiver`].
//!
//! Nothing here touches a socket, so every transition is unit-testable.
//!
//! ```text
//!              Transmitted
//!   SENDING ───────────────▶ AWAIT_ACK ──Acked──▶ DELIVERED
//!      ▲                         │
//!      │  Nacked / Corrupt /     │
//!      └──── TimedOut ───────────┤ (retries < max)
//!                                │
//!                                └── retries == max ──▶ FAILED
//! ```

/// Per-record sender state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// The frame is about to be (re)transmitted.
    Sending { retries: u32 },
    /// The frame is on the wire; waiting for a reply or a timeout.
    AwaitAck { retries: u32 },
    /// The receiver acknowledged the frame.
    Delivered,
    /// The retry budget ran out.
    Failed,
}

impl SenderState {
    /// Initial state for a fresh record.
    pub fn start() -> Self {
        SenderState::Sending { retries: 0 }
    }

    /// The action a driver should perform on entering this state.
    pub fn action(self) -> SenderAction {
        match self {
            SenderState::Sending { .. } => SenderAction::Transmit,
            SenderState::AwaitAck { .. } => SenderAction::AwaitReply,
            SenderState::Delivered => SenderAction::Complete,
            SenderState::Failed => SenderAction::GiveUp,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SenderState::Delivered | SenderState::Failed)
    }
}

impl Default for SenderState {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderState::Sending { retries } => write!(f, "SENDING(retries={retries})"),
            SenderState::AwaitAck { retries } => write!(f, "AWAIT_ACK(retries={retries})"),
            SenderState::Delivered => f.write_str("DELIVERED"),
            SenderState::Failed => f.write_str("FAILED"),
        }
    }
}

/// Something that happened to the in-flight frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderEvent {
    /// The frame was handed to the transport.
    Transmitted,
    /// A valid ACK carrying the frame's sequence number arrived.
    Acked,
    /// A valid reply arrived, but with NACK polarity or the wrong sequence number.
    Nacked,
    /// A reply arrived that failed to decode or verify.
    Corrupt,
    /// No reply arrived within the ack timeout.
    TimedOut,
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderAction {
    /// Put the stored frame on the wire, unchanged.
    Transmit,
    /// Block on a bounded receive.
    AwaitReply,
    /// The record is delivered.
    Complete,
    /// The record failed; stop retrying.
    GiveUp,
}

/// Pure sender transition.
///
/// Every negative outcome (`Nacked`, `Corrupt`, `TimedOut`) consumes one
/// retry; once `max_retries` are used up the record fails.  Events that make
/// no sense in the current state leave it unchanged.
pub fn transition(
    state: SenderState,
    event: SenderEvent,
    max_retries: u32,
) -> (SenderState, SenderAction) {
    use SenderEvent::*;
    use SenderState::*;

    let next = match (state, event) {
        (Sending { retries }, Transmitted) => AwaitAck { retries },
        (AwaitAck { .. }, Acked) => Delivered,
        (AwaitAck { retries }, Nacked | Corrupt | TimedOut) => {
            let retries = retries + 1;
            if retries >= max_retries {
                Failed
            } else {
                Sending { retries }
            }
        }
        (other, _) => other,
    };
    (next, next.action())
}

/// Classification of an inbound data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Not seen before: deliver it.
    New,
    /// Retransmission of the last delivered frame: acknowledge, don't deliver.
    Duplicate,
}

/// Receiver-side alternating-bit state for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupState {
    /// Sequence number of the last delivered frame, `None` before the first.
    last_delivered: Option<u32>,
}

impl DedupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_delivered(&self) -> Option<u32> {
        self.last_delivered
    }

    /// Classify `seqnum` against the last delivered frame.
    ///
    /// Before the first frame, `last_delivered` is taken as the complement of
    /// `seqnum`, so whatever arrives first is new.
    pub fn classify(&self, seqnum: u32) -> Delivery {
        let last = self.last_delivered.unwrap_or(seqnum ^ 1);
        if seqnum == last {
            Delivery::Duplicate
        } else {
            Delivery::New
        }
    }

    /// Record that `seqnum` was delivered.
    pub fn commit(&mut self, seqnum: u32) {
        self.last_delivered = Some(seqnum);
    }
}
