//! Protocol Module
//!
//! Defines the memcached text protocol as seen from the client side.
//!
//! ## Request Format
//! ```text
//! set <key> <flags> <exptime> <bytes> [noreply]\r\n<data block>\r\n
//! cas <key> <flags> <exptime> <bytes> <cas unique> [noreply]\r\n<data block>\r\n
//! get <key> [<key> ...]\r\n
//! gets <key> [<key> ...]\r\n
//! delete <key> [noreply]\r\n
//! incr|decr <key> <delta>\r\n
//! touch <key> <exptime> [noreply]\r\n
//! flush_all [delay] [noreply]\r\n
//! version\r\n | stats\r\n | quit\r\n
//! ```
//!
//! ### Reply Shapes
//! - Status line: `STORED`, `NOT_STORED`, `EXISTS`, `NOT_FOUND`, `DELETED`,
//!   `TOUCHED`, `OK`, `ERROR`, `CLIENT_ERROR <msg>`, `SERVER_ERROR <msg>`
//! - Value block: `VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\n` ... `END\r\n`
//! - Counter: `<digits>\r\n`
//! - Version: `VERSION <text>\r\n`
//! - Stats: `STAT <name> <value>\r\n` ... `END\r\n`

mod command;
mod reply;
mod codec;

pub use command::{Command, ReplyShape, StoreMode, validate_key, validate_value};
pub use reply::{Keyword, Reply, ValueRecord};
pub use codec::{
    FrameSource,
    encode, encode_set, encode_get, encode_delete,
    read_reply, read_expected,
    decode_value_block, decode_status, decode_counter, decode_version, decode_stats,
};
