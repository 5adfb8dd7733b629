//! Error types for emcache
//!
//! Every failure a client call can produce is classified into one closed
//! [`ErrorKind`], so callers branch on kind instead of matching messages.

use thiserror::Error;

/// Result type alias using EmcError
pub type Result<T> = std::result::Result<T, EmcError>;

/// Closed classification of client failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local key/value limits violated, nothing was sent
    Validation,
    /// Item missing or expired
    NotFound,
    /// Server rejected a store command
    SetFailed,
    /// Compare-and-swap token no longer matches
    CasConflict,
    /// Server had nothing to delete
    DeleteFailed,
    /// Server reported an error outside the store path
    Server,
    /// The channel broke; the connection is unusable
    Transport,
}

/// Unified error type for client operations
#[derive(Debug, Error)]
pub enum EmcError {
    // -------------------------------------------------------------------------
    // Local Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // -------------------------------------------------------------------------
    // Protocol Outcomes
    // -------------------------------------------------------------------------
    #[error("Item not found")]
    NotFound,

    #[error("Set failed: {0}")]
    SetFailed(String),

    #[error("CAS conflict: item was modified since it was fetched")]
    CasConflict,

    #[error("Delete failed: item not found")]
    DeleteFailed,

    #[error("Server error: {0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl EmcError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmcError::Validation(_) => ErrorKind::Validation,
            EmcError::NotFound => ErrorKind::NotFound,
            EmcError::SetFailed(_) => ErrorKind::SetFailed,
            EmcError::CasConflict => ErrorKind::CasConflict,
            EmcError::DeleteFailed => ErrorKind::DeleteFailed,
            EmcError::Server(_) => ErrorKind::Server,
            EmcError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// True when the channel failed rather than the server answering "no"
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        EmcError::Transport(TransportError::MalformedFrame(message.into()))
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        EmcError::Transport(TransportError::UnexpectedReply(message.into()))
    }
}

impl From<std::io::Error> for EmcError {
    fn from(err: std::io::Error) -> Self {
        EmcError::Transport(TransportError::from(err))
    }
}

/// Key/value limit violations detected before any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("key is empty")]
    EmptyKey,

    #[error("key is {len} bytes (max {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("key contains byte 0x{byte:02x} at offset {offset}")]
    InvalidKeyByte { byte: u8, offset: usize },

    #[error("value is {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("no keys given")]
    NoKeys,
}

/// Socket-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("operation timed out")]
    Timeout,

    #[error("connection closed by peer")]
    Closed,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("connection is broken by an earlier failure")]
    Broken,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            // Unix reports socket timeouts as WouldBlock, Windows as TimedOut
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => TransportError::Timeout,
            std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }
}
