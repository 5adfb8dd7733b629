//! Connection Transport
//!
//! Owns one stream and turns it into the two framing modes the codec needs:
//! CRLF-delimited lines and exact-length payloads. Bytes read past a frame
//! stay buffered for the next call.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::config::{Config, MAX_LINE_LEN};
use crate::error::{EmcError, Result, TransportError};
use crate::protocol::FrameSource;

/// Bytes requested from the stream per read call
const READ_CHUNK: usize = 16 * 1024;

/// Upper bound on buffer space reserved ahead of a length-framed read
const MAX_RESERVE: usize = 2 * 1024 * 1024;

/// Byte and command counters for one transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub commands_sent: u64,
}

/// A framed byte channel over one stream
pub struct Transport<S> {
    stream: S,

    /// Bytes received but not yet handed out
    read_buf: BytesMut,

    /// Prefix of `read_buf` already searched for a line break
    scanned: usize,

    stats: TransportStats,
}

impl Transport<TcpStream> {
    /// Open a TCP connection configured from `config`
    ///
    /// Timeouts of 0 leave the socket blocking without a deadline.
    pub fn connect(config: &Config) -> Result<Self> {
        let addr = resolve(&config.server_addr)?;

        tracing::debug!("Connecting to {}", addr);
        let stream = if config.connect_timeout_ms > 0 {
            TcpStream::connect_timeout(&addr, Duration::from_millis(config.connect_timeout_ms))?
        } else {
            TcpStream::connect(addr)?
        };

        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }
        stream.set_nodelay(config.nodelay)?;

        tracing::info!("Connected to {}", addr);
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> Transport<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            scanned: 0,
            stats: TransportStats::default(),
        }
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Counters since the transport was created
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Bytes received but not consumed by any frame yet
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    /// Write a complete frame
    ///
    /// Partial writes are continued until every byte is accepted; a stream
    /// that accepts zero bytes is treated as closed.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < frame.len() {
            match self.stream.write(&frame[written..]) {
                Ok(0) => return Err(TransportError::Closed.into()),
                Ok(n) => {
                    written += n;
                    self.stats.bytes_written += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        loop {
            match self.stream.flush() {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.stats.commands_sent += 1;
        tracing::trace!("Sent frame of {} bytes", frame.len());
        Ok(())
    }

    /// Read up to the next CRLF and return the line without it
    pub fn receive_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(offset) = self.read_buf[self.scanned..].iter().position(|&b| b == b'\n') {
                let newline = self.scanned + offset;
                self.scanned = 0;

                if newline == 0 || self.read_buf[newline - 1] != b'\r' {
                    return Err(EmcError::malformed("line terminated by bare LF"));
                }

                let mut line = self.read_buf.split_to(newline + 1);
                line.truncate(newline - 1);
                tracing::trace!("Received line {:?}", String::from_utf8_lossy(&line));
                return Ok(line.to_vec());
            }

            self.scanned = self.read_buf.len();
            if self.scanned > MAX_LINE_LEN {
                return Err(EmcError::malformed(format!(
                    "line exceeds {} bytes without a terminator",
                    MAX_LINE_LEN
                )));
            }

            self.fill()?;
        }
    }

    /// Read exactly `len` bytes
    pub fn receive_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.read_buf.len() < len {
            self.read_buf.reserve((len - self.read_buf.len()).min(MAX_RESERVE));
        }
        while self.read_buf.len() < len {
            self.fill()?;
        }

        let mut data = vec![0u8; len];
        self.read_buf.copy_to_slice(&mut data);
        self.scanned = 0;
        Ok(data)
    }

    /// Append one read's worth of bytes to the buffer
    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed.into()),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                    self.stats.bytes_read += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<S: Read + Write> FrameSource for Transport<S> {
    fn receive_line(&mut self) -> Result<Vec<u8>> {
        Transport::receive_line(self)
    }

    fn receive_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        Transport::receive_exact(self, len)
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", addr, e)))?
        .next()
        .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()).into())
}
