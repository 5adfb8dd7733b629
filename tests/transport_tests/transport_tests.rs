//! Tests for Transport
//!
//! These tests verify:
//! - Line framing with buffering of over-read bytes
//! - Exact-length reads across partial reads
//! - Full writes across partial writes
//! - Mapping of EOF, timeouts and write failures

#[path = "../common/mod.rs"]
mod common;

use std::io::ErrorKind as IoErrorKind;

use common::ScriptedStream;
use emcache::config::MAX_LINE_LEN;
use emcache::{EmcError, Transport, TransportError};

// =============================================================================
// Line Framing Tests
// =============================================================================

#[test]
fn test_receive_line_strips_terminator() {
    let mut transport = Transport::new(ScriptedStream::new(b"STORED\r\n".to_vec()));
    assert_eq!(transport.receive_line().unwrap(), b"STORED");
    assert_eq!(transport.buffered(), 0);
}

#[test]
fn test_receive_line_keeps_over_read_bytes() {
    let mut transport = Transport::new(ScriptedStream::new(b"VALUE k 0 3\r\nabc\r\nEND\r\n".to_vec()));

    assert_eq!(transport.receive_line().unwrap(), b"VALUE k 0 3");
    assert_eq!(transport.buffered(), b"abc\r\nEND\r\n".len());
    assert_eq!(transport.receive_exact(5).unwrap(), b"abc\r\n");
    assert_eq!(transport.receive_line().unwrap(), b"END");
}

#[test]
fn test_receive_line_one_byte_at_a_time() {
    let stream = ScriptedStream::new(b"first\r\nsecond\r\n".to_vec()).with_chunk(1);
    let mut transport = Transport::new(stream);

    assert_eq!(transport.receive_line().unwrap(), b"first");
    assert_eq!(transport.receive_line().unwrap(), b"second");
}

#[test]
fn test_receive_line_cr_split_from_lf() {
    // CR arrives at the end of one read, LF at the start of the next
    let stream = ScriptedStream::new(b"OK\r\n".to_vec()).with_chunk(3);
    let mut transport = Transport::new(stream);
    assert_eq!(transport.receive_line().unwrap(), b"OK");
}

#[test]
fn test_receive_empty_line() {
    let mut transport = Transport::new(ScriptedStream::new(b"\r\n".to_vec()));
    assert_eq!(transport.receive_line().unwrap(), b"");
}

#[test]
fn test_receive_line_bare_lf_is_malformed() {
    let mut transport = Transport::new(ScriptedStream::new(b"END\n".to_vec()));
    let err = transport.receive_line().unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::MalformedFrame(_))));
}

#[test]
fn test_receive_line_too_long() {
    let endless = vec![b'x'; MAX_LINE_LEN * 2];
    let mut transport = Transport::new(ScriptedStream::new(endless));
    let err = transport.receive_line().unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::MalformedFrame(_))));
}

#[test]
fn test_receive_line_eof_is_closed() {
    let mut transport = Transport::new(ScriptedStream::new(b"STOR".to_vec()));
    let err = transport.receive_line().unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::Closed)));
}

#[test]
fn test_receive_line_timeout() {
    let stream = ScriptedStream::new(Vec::new()).timing_out();
    let mut transport = Transport::new(stream);
    let err = transport.receive_line().unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::Timeout)));
    assert!(err.is_transport());
}

// =============================================================================
// Exact-Length Tests
// =============================================================================

#[test]
fn test_receive_exact_large_payload_in_chunks() {
    let payload = common::binary_value(1 << 19);
    let stream = ScriptedStream::new(payload.clone()).with_chunk(4096);
    let mut transport = Transport::new(stream);

    let data = transport.receive_exact(payload.len()).unwrap();
    assert_eq!(data, payload);
    assert_eq!(transport.stats().bytes_read, payload.len() as u64);
}

#[test]
fn test_receive_exact_zero() {
    let mut transport = Transport::new(ScriptedStream::new(b"END\r\n".to_vec()));
    assert!(transport.receive_exact(0).unwrap().is_empty());
    assert_eq!(transport.receive_line().unwrap(), b"END");
}

#[test]
fn test_receive_exact_short_stream() {
    let mut transport = Transport::new(ScriptedStream::new(b"abc".to_vec()));
    let err = transport.receive_exact(10).unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::Closed)));
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_send_completes_partial_writes() {
    let frame = common::binary_value(10_000);
    let stream = ScriptedStream::new(Vec::new()).with_chunk(3);
    let mut transport = Transport::new(stream);

    transport.send(&frame).unwrap();

    assert_eq!(transport.get_ref().output, frame);
    let stats = transport.stats();
    assert_eq!(stats.bytes_written, frame.len() as u64);
    assert_eq!(stats.commands_sent, 1);
}

#[test]
fn test_send_failure_is_transport_error() {
    let stream = ScriptedStream::new(Vec::new()).failing_writes(IoErrorKind::ConnectionReset);
    let mut transport = Transport::new(stream);

    let err = transport.send(b"get k\r\n").unwrap_err();
    match err {
        EmcError::Transport(TransportError::Io(e)) => assert_eq!(e.kind(), IoErrorKind::ConnectionReset),
        other => panic!("Expected IO transport error, got {:?}", other),
    }
}

#[test]
fn test_send_timeout() {
    let stream = ScriptedStream::new(Vec::new()).failing_writes(IoErrorKind::TimedOut);
    let mut transport = Transport::new(stream);
    let err = transport.send(b"get k\r\n").unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::Timeout)));
}

#[test]
fn test_send_zero_length_write_is_closed() {
    let stream = ScriptedStream::new(Vec::new()).with_chunk(0);
    let mut transport = Transport::new(stream);
    let err = transport.send(b"version\r\n").unwrap_err();
    assert!(matches!(err, EmcError::Transport(TransportError::Closed)));
}
