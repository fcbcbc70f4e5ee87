//! Sender ARQ behaviour against a scripted transport.
//!
//! The scripted transport answers every bounded receive from a fixed list of
//! replies, so retry counts and retransmitted bytes are exact.

mod common;

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use common::{addr, frame, Reply, ScriptedTransport};
use rdt_over_udp::packet::{DATA_CAPACITY, END_OF_STREAM, FRAME_LEN};
use rdt_over_udp::{Packet, SendError, Sender, SenderConfig, TransportError};

fn config(max_retries: u32) -> SenderConfig {
    SenderConfig {
        ack_timeout: Duration::from_millis(10),
        max_retries,
    }
}

fn acks(seqs: &[u32]) -> Vec<Reply> {
    seqs.iter().map(|&s| Reply::Bytes(frame(Packet::ack(s)))).collect()
}

fn decode_all(frames: &[Vec<u8>]) -> Vec<Packet> {
    frames
        .iter()
        .filter(|f| f.len() == FRAME_LEN)
        .map(|f| Packet::decode(f).unwrap())
        .collect()
}

#[tokio::test]
async fn seqnums_alternate_over_consecutive_records() {
    let transport = ScriptedTransport::new(addr(9), acks(&[0, 1, 0, 1, 0]));
    let mut sender = Sender::new(transport, addr(9), config(3));

    let mut used = Vec::new();
    for i in 0..5 {
        let report = sender.send_record(format!("rec-{i}\n").as_bytes()).await.unwrap();
        assert_eq!(report.transmissions, 1);
        used.push(report.seqnum);
    }
    assert_eq!(used, vec![0, 1, 0, 1, 0]);
    assert_eq!(sender.next_seq(), 1);

    let sent = decode_all(&sender.transport().sent());
    let wire: Vec<u32> = sent.iter().map(Packet::seqnum).collect();
    assert_eq!(wire, vec![0, 1, 0, 1, 0]);
}

#[tokio::test]
async fn total_loss_fails_after_exactly_max_transmissions() {
    const MAX: u32 = 4;
    let mut sender = Sender::new(ScriptedTransport::silent(addr(9)), addr(9), config(MAX));

    let err = sender.send_record(b"lost\n").await.unwrap_err();
    assert!(
        matches!(err, SendError::MaxRetriesExceeded { seqnum: 0, attempts: MAX }),
        "unexpected error: {err:?}"
    );
    assert_eq!(sender.transport().sent().len(), MAX as usize);
    // A failed record does not advance the alternating bit.
    assert_eq!(sender.next_seq(), 0);
}

#[tokio::test]
async fn retransmissions_are_byte_identical() {
    let script = [
        Reply::Timeout,
        Reply::Bytes(frame(Packet::nack(0))),
        Reply::Bytes(frame(Packet::ack(1))), // stale seqnum
        Reply::Bytes(frame(Packet::ack(0))),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(10));

    let report = sender.send_record(b"hello\n").await.unwrap();
    assert_eq!(report.transmissions, 4);

    let sent = sender.transport().sent();
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|f| f == &sent[0]));
    assert_eq!(Packet::decode(&sent[0]).unwrap().payload(), b"hello\n");
}

#[tokio::test]
async fn corrupt_ack_counts_as_a_failed_attempt() {
    let mut damaged = frame(Packet::ack(0));
    damaged[2] ^= 0x40;
    let script = [Reply::Bytes(damaged), Reply::Bytes(frame(Packet::ack(0)))];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(10));

    let report = sender.send_record(b"x").await.unwrap();
    assert_eq!(report.transmissions, 2);
}

#[tokio::test]
async fn undecodable_replies_are_treated_as_corrupt() {
    let script = [
        Reply::Bytes(vec![END_OF_STREAM]),
        Reply::Bytes(vec![0u8; 40]),
        Reply::Bytes(frame(Packet::ack(0))),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(10));

    assert_eq!(sender.send_record(b"x").await.unwrap().transmissions, 3);
}

#[tokio::test]
async fn connection_reset_while_awaiting_ack_is_retried() {
    let script = [
        Reply::Error(io::ErrorKind::ConnectionReset),
        Reply::Bytes(frame(Packet::ack(0))),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(10));

    let report = sender.send_record(b"hello\n").await.unwrap();
    assert_eq!(report.transmissions, 2);
    let sent = sender.transport().sent();
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sender.next_seq(), 1);
}

#[tokio::test]
async fn refused_receives_consume_the_retry_budget() {
    let script = [
        Reply::Error(io::ErrorKind::ConnectionRefused),
        Reply::Error(io::ErrorKind::ConnectionRefused),
        Reply::Error(io::ErrorKind::ConnectionRefused),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(3));

    let err = sender.send_record(b"x").await.unwrap_err();
    assert!(matches!(err, SendError::MaxRetriesExceeded { attempts: 3, .. }));
}

#[tokio::test]
async fn other_receive_errors_end_the_transfer() {
    let script = [
        Reply::Error(io::ErrorKind::PermissionDenied),
        Reply::Bytes(frame(Packet::ack(0))),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(10));

    let err = sender.send_record(b"x").await.unwrap_err();
    assert!(matches!(err, SendError::Transport(TransportError::Io(_))), "{err:?}");
    assert_eq!(sender.transport().sent().len(), 1);
}

#[tokio::test]
async fn negative_replies_consume_the_retry_budget() {
    let script = [
        Reply::Bytes(frame(Packet::nack(0))),
        Reply::Bytes(frame(Packet::nack(0))),
        Reply::Bytes(frame(Packet::ack(0))),
    ];
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), script), addr(9), config(2));

    let err = sender.send_record(b"x").await.unwrap_err();
    assert!(matches!(err, SendError::MaxRetriesExceeded { attempts: 2, .. }));
}

#[tokio::test]
async fn oversized_record_is_truncated_to_capacity() {
    let mut sender = Sender::new(ScriptedTransport::new(addr(9), acks(&[0])), addr(9), config(3));
    let record = vec![b'a'; DATA_CAPACITY + 100];

    let report = sender.send_record(&record).await.unwrap();
    assert_eq!(report.payload_len, DATA_CAPACITY);

    let sent = decode_all(&sender.transport().sent());
    assert_eq!(sent[0].data_len() as usize, DATA_CAPACITY);
}

#[tokio::test]
async fn stream_ends_with_sentinel() {
    let transport = ScriptedTransport::new(addr(9), acks(&[0, 1]));
    let mut sender = Sender::new(transport, addr(9), config(3));
    let mut source: VecDeque<Vec<u8>> = [b"hello\n".to_vec(), b"world\n".to_vec()].into();

    let summary = sender.send_stream(&mut source).await.unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.retransmissions(), 0);
    assert_eq!(summary.bytes, 12);

    let sent = sender.transport().sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent.last().unwrap(), &vec![END_OF_STREAM]);
    assert!(sender.transport().sent_to().iter().all(|a| *a == addr(9)));
}

#[tokio::test]
async fn failed_record_aborts_stream_without_sentinel() {
    let transport = ScriptedTransport::new(addr(9), acks(&[0]));
    let mut sender = Sender::new(transport, addr(9), config(2));
    let mut source: VecDeque<Vec<u8>> = [b"one\n".to_vec(), b"two\n".to_vec()].into();

    let err = sender.send_stream(&mut source).await.unwrap_err();
    assert!(matches!(err, SendError::MaxRetriesExceeded { seqnum: 1, .. }));
    assert!(!sender.transport().sent().contains(&vec![END_OF_STREAM]));
}
