//! Command definitions
//!
//! Represents requests a client can send. Keys and values are borrowed from
//! the caller; nothing is copied until the frame is encoded.

use crate::config::Limits;
use crate::error::ValidationError;

/// Storage command flavours sharing one wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    /// Store only if the item still carries this version token
    Cas { unique: u64 },
}

impl StoreMode {
    /// Wire keyword for this mode
    pub fn keyword(&self) -> &'static str {
        match self {
            StoreMode::Set => "set",
            StoreMode::Add => "add",
            StoreMode::Replace => "replace",
            StoreMode::Append => "append",
            StoreMode::Prepend => "prepend",
            StoreMode::Cas { .. } => "cas",
        }
    }
}

/// What the server sends back for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// One status line
    Status,
    /// `VALUE` records terminated by `END`
    Values,
    /// Decimal counter or `NOT_FOUND`
    Counter,
    /// `VERSION <text>`
    Version,
    /// `STAT` lines terminated by `END`
    Stats,
    /// Nothing (noreply or quit)
    None,
}

/// A request to send to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// set/add/replace/append/prepend/cas
    Store {
        mode: StoreMode,
        key: &'a [u8],
        value: &'a [u8],
        flags: u32,
        exptime: u32,
        noreply: bool,
    },

    /// Retrieve one or many keys
    Get { keys: Vec<&'a [u8]> },

    /// Retrieve one or many keys with their version tokens
    Gets { keys: Vec<&'a [u8]> },

    /// Remove a key
    Delete { key: &'a [u8], noreply: bool },

    /// Add to a numeric value
    Incr { key: &'a [u8], delta: u64 },

    /// Subtract from a numeric value (clamped at zero by the server)
    Decr { key: &'a [u8], delta: u64 },

    /// Reset the expiration of a key
    Touch { key: &'a [u8], exptime: u32, noreply: bool },

    /// Invalidate all items, optionally after a delay in seconds
    FlushAll { delay: Option<u32>, noreply: bool },

    /// Ask for the server version
    Version,

    /// Ask for general statistics
    Stats,

    /// Close the connection
    Quit,
}

impl Command<'_> {
    /// Wire keyword, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Store { mode, .. } => mode.keyword(),
            Command::Get { .. } => "get",
            Command::Gets { .. } => "gets",
            Command::Delete { .. } => "delete",
            Command::Incr { .. } => "incr",
            Command::Decr { .. } => "decr",
            Command::Touch { .. } => "touch",
            Command::FlushAll { .. } => "flush_all",
            Command::Version => "version",
            Command::Stats => "stats",
            Command::Quit => "quit",
        }
    }

    /// True when the server will not acknowledge this command
    pub fn noreply(&self) -> bool {
        match self {
            Command::Store { noreply, .. }
            | Command::Delete { noreply, .. }
            | Command::Touch { noreply, .. }
            | Command::FlushAll { noreply, .. } => *noreply,
            _ => false,
        }
    }

    /// Reply shape the codec must read after sending this command
    pub fn reply_shape(&self) -> ReplyShape {
        if self.noreply() {
            return ReplyShape::None;
        }
        match self {
            Command::Store { .. }
            | Command::Delete { .. }
            | Command::Touch { .. }
            | Command::FlushAll { .. } => ReplyShape::Status,
            Command::Get { .. } | Command::Gets { .. } => ReplyShape::Values,
            Command::Incr { .. } | Command::Decr { .. } => ReplyShape::Counter,
            Command::Version => ReplyShape::Version,
            Command::Stats => ReplyShape::Stats,
            Command::Quit => ReplyShape::None,
        }
    }
}

/// Check a key against the protocol rules
///
/// Keys must be 1..=max_key_len bytes with no whitespace or control bytes,
/// since the text protocol delimits fields with spaces and lines with CRLF.
pub fn validate_key(key: &[u8], limits: &Limits) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.len() > limits.max_key_len {
        return Err(ValidationError::KeyTooLong {
            len: key.len(),
            max: limits.max_key_len,
        });
    }
    if let Some(offset) = key.iter().position(|&b| b <= b' ' || b == 0x7f) {
        return Err(ValidationError::InvalidKeyByte {
            byte: key[offset],
            offset,
        });
    }
    Ok(())
}

/// Check a value against the configured size limit
pub fn validate_value(value: &[u8], limits: &Limits) -> Result<(), ValidationError> {
    if value.len() > limits.max_value_len {
        return Err(ValidationError::ValueTooLarge {
            len: value.len(),
            max: limits.max_value_len,
        });
    }
    Ok(())
}
