//! `rdt-over-udp`: reliable, ordered record delivery over UDP using
//! stop-and-wait ARQ with an alternating-bit sequence number (rdt3.0).
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   records   ┌──────────┐   DATA seq=0/1   ┌──────────┐   payload   ┌──────┐
//!  │  Source  │────────────▶│  Sender  │─────────────────▶│ Receiver │────────────▶│ Sink │
//!  └──────────┘             └────┬─────┘                  └────┬─────┘             └──────┘
//!                                │◀────────── ACK seq ─────────┘
//!                                │
//!                       ┌────────▼─────────┐
//!                       │    Transport     │  (tokio UdpSocket, or in-memory in tests)
//!                       └──────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`checksum`]: header and payload checksums, corruption verdict
//! - [`packet`]: fixed-size wire format (serialise / deserialise)
//! - [`state`]: pure sender FSM and receiver duplicate classifier
//! - [`sender`]: stop-and-wait outbound driver
//! - [`receiver`]: inbound driver with duplicate suppression
//! - [`transport`]: datagram transport trait and UDP implementation
//! - [`stream`]: record source and payload sink collaborators
//! - [`simulator`]: optional inbound loss for exercising retries
//! - [`config`]: explicit sender / receiver configuration

pub mod checksum;
pub mod config;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod state;
pub mod stream;
pub mod transport;

pub use config::{ReceiverConfig, SenderConfig, SERVER_PORT};
pub use packet::{Packet, PacketError};
pub use receiver::{ReceiveError, ReceiveSummary, Receiver, Step};
pub use sender::{SendError, Sender, TransferSummary};
pub use transport::{Datagram, Transport, TransportError, UdpTransport};
