//! # emcache
//!
//! A blocking client for the memcached text protocol:
//! - Typed replies decoded from a closed keyword vocabulary
//! - Classified errors (validation, not-found, set/delete failure, transport)
//! - Exact-length framing of value blocks, binary safe
//! - One connection per client, strict request/response alternation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client / SharedClient                        │
//! │        (validation, reply mapping, poisoning)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Command / Reply
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Protocol Codec                             │
//! │          (encode frames, decode reply shapes)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ lines / exact-length blocks
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Transport                                │
//! │        (buffered stream, full writes, timeouts)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use emcache::{Client, ErrorKind};
//!
//! fn main() -> emcache::Result<()> {
//!     let mut client = Client::connect("127.0.0.1:11211")?;
//!     client.set(b"greeting", b"hello", 0, 0, false)?;
//!
//!     let item = client.get(b"greeting")?;
//!     assert_eq!(item.value, b"hello");
//!
//!     match client.get(b"missing") {
//!         Err(e) if e.kind() == ErrorKind::NotFound => {}
//!         other => panic!("unexpected: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod item;
pub mod protocol;
pub mod transport;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmcError, ErrorKind, Result, TransportError, ValidationError};
pub use config::{Config, Limits, MAX_KEY_LEN, MAX_VALUE_LEN, RELATIVE_EXPTIME_LIMIT};
pub use item::Item;
pub use transport::{Transport, TransportStats};
pub use client::{Client, SharedClient};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of emcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
