//! Protocol codec
//!
//! Encoding of commands into wire frames and decoding of server replies.
//!
//! ## Framing
//! ```text
//! ┌───────────────────────────────┬──────┬──────────────────┬──────┐
//! │ Header line                   │ CRLF │ Data block       │ CRLF │
//! │ (space separated, ASCII)      │      │ (exactly <bytes>)│      │
//! └───────────────────────────────┴──────┴──────────────────┴──────┘
//! ```
//! Header and status lines are delimiter framed. Data blocks are length
//! framed: a payload may itself contain CRLF, so the decoder asks the
//! source for exactly `<bytes>` bytes followed by the pair terminator.

use std::str::FromStr;

use crate::config::Limits;
use crate::error::{EmcError, Result, ValidationError};
use super::command::{validate_key, validate_value, Command, ReplyShape, StoreMode};
use super::reply::{Keyword, Reply, ValueRecord};

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Room for keyword, numbers, separators and terminators of a store header
const STORE_HEADER_OVERHEAD: usize = 96;

/// Byte source able to deliver both framing modes
///
/// Implemented by the transport; the codec never touches a socket itself.
pub trait FrameSource {
    /// Next CRLF-terminated line, without the terminator
    fn receive_line(&mut self) -> Result<Vec<u8>>;

    /// Exactly `len` bytes, whatever they contain
    fn receive_exact(&mut self, len: usize) -> Result<Vec<u8>>;
}

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command into one wire frame
///
/// Keys and values are validated first; a violation returns
/// `EmcError::Validation` and produces no bytes.
pub fn encode(command: &Command<'_>, limits: &Limits) -> Result<Vec<u8>> {
    let frame = match command {
        Command::Store { mode, key, value, flags, exptime, noreply } => {
            validate_key(key, limits)?;
            validate_value(value, limits)?;

            let mut frame = Vec::with_capacity(key.len() + value.len() + STORE_HEADER_OVERHEAD);
            frame.extend_from_slice(mode.keyword().as_bytes());
            push_field(&mut frame, key);
            push_number(&mut frame, u64::from(*flags));
            push_number(&mut frame, u64::from(*exptime));
            push_number(&mut frame, value.len() as u64);
            if let StoreMode::Cas { unique } = mode {
                push_number(&mut frame, *unique);
            }
            push_noreply(&mut frame, *noreply);
            frame.extend_from_slice(CRLF);
            frame.extend_from_slice(value);
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::Get { keys } | Command::Gets { keys } => {
            if keys.is_empty() {
                return Err(ValidationError::NoKeys.into());
            }
            let mut frame = Vec::with_capacity(8 + keys.iter().map(|k| k.len() + 1).sum::<usize>());
            frame.extend_from_slice(command.name().as_bytes());
            for key in keys {
                validate_key(key, limits)?;
                push_field(&mut frame, key);
            }
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::Delete { key, noreply } => {
            validate_key(key, limits)?;
            let mut frame = Vec::with_capacity(key.len() + 24);
            frame.extend_from_slice(b"delete");
            push_field(&mut frame, key);
            push_noreply(&mut frame, *noreply);
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::Incr { key, delta } | Command::Decr { key, delta } => {
            validate_key(key, limits)?;
            let mut frame = Vec::with_capacity(key.len() + 32);
            frame.extend_from_slice(command.name().as_bytes());
            push_field(&mut frame, key);
            push_number(&mut frame, *delta);
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::Touch { key, exptime, noreply } => {
            validate_key(key, limits)?;
            let mut frame = Vec::with_capacity(key.len() + 32);
            frame.extend_from_slice(b"touch");
            push_field(&mut frame, key);
            push_number(&mut frame, u64::from(*exptime));
            push_noreply(&mut frame, *noreply);
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::FlushAll { delay, noreply } => {
            let mut frame = b"flush_all".to_vec();
            if let Some(delay) = delay {
                push_number(&mut frame, u64::from(*delay));
            }
            push_noreply(&mut frame, *noreply);
            frame.extend_from_slice(CRLF);
            frame
        }
        Command::Version => b"version\r\n".to_vec(),
        Command::Stats => b"stats\r\n".to_vec(),
        Command::Quit => b"quit\r\n".to_vec(),
    };

    Ok(frame)
}

/// Encode a `set` command
///
/// Format: `set <key> <flags> <exptime> <bytes>[ noreply]\r\n<value>\r\n`
pub fn encode_set(
    key: &[u8],
    value: &[u8],
    flags: u32,
    exptime: u32,
    noreply: bool,
    limits: &Limits,
) -> Result<Vec<u8>> {
    encode(
        &Command::Store {
            mode: StoreMode::Set,
            key,
            value,
            flags,
            exptime,
            noreply,
        },
        limits,
    )
}

/// Encode a `get` command for one or many keys
///
/// Format: `get <key> [<key> ...]\r\n`
pub fn encode_get(keys: &[&[u8]], limits: &Limits) -> Result<Vec<u8>> {
    encode(&Command::Get { keys: keys.to_vec() }, limits)
}

/// Encode a `delete` command
///
/// Format: `delete <key>[ noreply]\r\n`
pub fn encode_delete(key: &[u8], noreply: bool, limits: &Limits) -> Result<Vec<u8>> {
    encode(&Command::Delete { key, noreply }, limits)
}

fn push_field(frame: &mut Vec<u8>, field: &[u8]) {
    frame.push(b' ');
    frame.extend_from_slice(field);
}

fn push_number(frame: &mut Vec<u8>, value: u64) {
    frame.push(b' ');
    frame.extend_from_slice(value.to_string().as_bytes());
}

fn push_noreply(frame: &mut Vec<u8>, noreply: bool) {
    if noreply {
        frame.extend_from_slice(b" noreply");
    }
}

// =============================================================================
// Reply Decoding
// =============================================================================

/// Read one complete reply, whatever its shape
///
/// The first token selects the shape: `VALUE`/`END` read a value block,
/// `STAT` reads stat lines up to `END`, a bare number is a counter and
/// everything else must be a status from the closed vocabulary.
pub fn read_reply<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    let line = source.receive_line()?;
    let (token, rest) = split_token(&line);

    let keyword = match Keyword::parse(token) {
        Some(keyword) => keyword,
        None => return parse_counter(&line),
    };

    match keyword {
        Keyword::Value | Keyword::End => read_value_records(source, line).map(Reply::Values),
        Keyword::Stat => read_stat_lines(source, line).map(Reply::Stats),
        Keyword::Version => Ok(Reply::Version(lossy(rest))),
        Keyword::Stored => bare(rest, Reply::Stored),
        Keyword::NotStored => bare(rest, Reply::NotStored),
        Keyword::Exists => bare(rest, Reply::Exists),
        Keyword::NotFound => bare(rest, Reply::NotFound),
        Keyword::Deleted => bare(rest, Reply::Deleted),
        Keyword::Touched => bare(rest, Reply::Touched),
        Keyword::Ok => bare(rest, Reply::Ok),
        // Some servers append a reason to ERROR; it carries nothing we use
        Keyword::Error => Ok(Reply::Error),
        Keyword::ClientError => Ok(Reply::ClientError(lossy(rest))),
        Keyword::ServerError => Ok(Reply::ServerError(lossy(rest))),
    }
}

/// Read the reply a command with the given shape expects
///
/// Returns `None` without touching the source for `ReplyShape::None`.
pub fn read_expected<F: FrameSource + ?Sized>(source: &mut F, shape: ReplyShape) -> Result<Option<Reply>> {
    let reply = match shape {
        ReplyShape::None => return Ok(None),
        ReplyShape::Status => decode_status(source)?,
        ReplyShape::Values => decode_value_block(source)?,
        ReplyShape::Counter => decode_counter(source)?,
        ReplyShape::Version => decode_version(source)?,
        ReplyShape::Stats => decode_stats(source)?,
    };
    Ok(Some(reply))
}

/// Decode a retrieval reply
///
/// Yields `Reply::Values` (possibly empty) or an error status.
pub fn decode_value_block<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    match read_reply(source)? {
        reply @ Reply::Values(_) => Ok(reply),
        reply if reply.is_error() => Ok(reply),
        other => Err(EmcError::unexpected(format!("expected value block, got {}", other.describe()))),
    }
}

/// Decode a single status line
pub fn decode_status<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    match read_reply(source)? {
        reply if reply.is_status() => Ok(reply),
        other => Err(EmcError::unexpected(format!("expected status line, got {}", other.describe()))),
    }
}

/// Decode an incr/decr reply
pub fn decode_counter<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    match read_reply(source)? {
        reply @ (Reply::Counter(_) | Reply::NotFound) => Ok(reply),
        reply if reply.is_error() => Ok(reply),
        other => Err(EmcError::unexpected(format!("expected counter, got {}", other.describe()))),
    }
}

/// Decode a `VERSION <text>` reply
pub fn decode_version<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    match read_reply(source)? {
        reply @ Reply::Version(_) => Ok(reply),
        reply if reply.is_error() => Ok(reply),
        other => Err(EmcError::unexpected(format!("expected version, got {}", other.describe()))),
    }
}

/// Decode a `STAT` listing
pub fn decode_stats<F: FrameSource + ?Sized>(source: &mut F) -> Result<Reply> {
    match read_reply(source)? {
        reply @ Reply::Stats(_) => Ok(reply),
        // A bare END is an empty listing
        Reply::Values(records) if records.is_empty() => Ok(Reply::Stats(Vec::new())),
        reply if reply.is_error() => Ok(reply),
        other => Err(EmcError::unexpected(format!("expected stats, got {}", other.describe()))),
    }
}

fn read_value_records<F: FrameSource + ?Sized>(source: &mut F, first: Vec<u8>) -> Result<Vec<ValueRecord>> {
    let mut records = Vec::new();
    let mut line = first;

    loop {
        let (token, rest) = split_token(&line);
        match Keyword::parse(token) {
            Some(Keyword::Value) => records.push(read_value_record(source, rest)?),
            Some(Keyword::End) => {
                expect_bare(rest, "END")?;
                return Ok(records);
            }
            _ => {
                return Err(EmcError::malformed(format!(
                    "expected VALUE or END, got {:?}",
                    String::from_utf8_lossy(&line)
                )))
            }
        }
        line = source.receive_line()?;
    }
}

/// Decode `<key> <flags> <bytes> [<cas>]` and the data block after it
fn read_value_record<F: FrameSource + ?Sized>(source: &mut F, header: &[u8]) -> Result<ValueRecord> {
    let fields: Vec<&[u8]> = header.split(|&b| b == b' ').filter(|f| !f.is_empty()).collect();
    if fields.len() != 3 && fields.len() != 4 {
        return Err(EmcError::malformed(format!(
            "VALUE header has {} fields, expected 3 or 4",
            fields.len()
        )));
    }

    let key = fields[0].to_vec();
    let flags = parse_number::<u32>(fields[1], "flags")?;
    let len = parse_number::<usize>(fields[2], "bytes")?;
    let cas = match fields.get(3) {
        Some(field) => Some(parse_number::<u64>(field, "cas")?),
        None => None,
    };

    let framed_len = len
        .checked_add(CRLF.len())
        .ok_or_else(|| EmcError::malformed("data block length overflows"))?;
    let mut value = source.receive_exact(framed_len)?;
    if !value.ends_with(CRLF) {
        return Err(EmcError::malformed(format!(
            "data block for {:?} not terminated by CRLF",
            String::from_utf8_lossy(&key)
        )));
    }
    value.truncate(len);

    Ok(ValueRecord { key, flags, value, cas })
}

fn read_stat_lines<F: FrameSource + ?Sized>(source: &mut F, first: Vec<u8>) -> Result<Vec<(String, String)>> {
    let mut stats = Vec::new();
    let mut line = first;

    loop {
        let (token, rest) = split_token(&line);
        match Keyword::parse(token) {
            Some(Keyword::Stat) => {
                let (name, value) = split_token(rest);
                if name.is_empty() {
                    return Err(EmcError::malformed("STAT line without a name"));
                }
                stats.push((lossy(name), lossy(value)));
            }
            Some(Keyword::End) => {
                expect_bare(rest, "END")?;
                return Ok(stats);
            }
            _ => {
                return Err(EmcError::malformed(format!(
                    "expected STAT or END, got {:?}",
                    String::from_utf8_lossy(&line)
                )))
            }
        }
        line = source.receive_line()?;
    }
}

fn parse_counter(line: &[u8]) -> Result<Reply> {
    // Older servers pad counter replies with trailing spaces
    let end = line.iter().rposition(|&b| b != b' ').map_or(0, |pos| pos + 1);
    let digits = &line[..end];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(EmcError::malformed(format!(
            "unknown reply {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    parse_number::<u64>(digits, "counter").map(Reply::Counter)
}

fn split_token(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|&b| b == b' ') {
        Some(pos) => (&line[..pos], &line[pos + 1..]),
        None => (line, &line[line.len()..]),
    }
}

fn bare(rest: &[u8], reply: Reply) -> Result<Reply> {
    expect_bare(rest, &reply.describe())?;
    Ok(reply)
}

fn expect_bare(rest: &[u8], keyword: &str) -> Result<()> {
    if rest.iter().any(|&b| b != b' ') {
        return Err(EmcError::malformed(format!(
            "unexpected text after {}: {:?}",
            keyword,
            String::from_utf8_lossy(rest)
        )));
    }
    Ok(())
}

fn parse_number<T: FromStr>(field: &[u8], name: &str) -> Result<T> {
    std::str::from_utf8(field)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| {
            EmcError::malformed(format!(
                "invalid {} field {:?}",
                name,
                String::from_utf8_lossy(field)
            ))
        })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
