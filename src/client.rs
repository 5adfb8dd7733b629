//! Client Façade
//!
//! Public operations over one connection. Every call is a single
//! request/response cycle:
//!
//! 1. Validate keys and values (no I/O on failure)
//! 2. Encode and send the command
//! 3. Return immediately for `noreply` commands
//! 4. Decode the reply and map it to a value or a classified error
//!
//! A transport failure poisons the client: the stream may hold half a reply,
//! so every later call fails with [`TransportError::Broken`] without I/O.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Config, Limits};
use crate::error::{EmcError, Result, TransportError};
use crate::item::Item;
use crate::protocol::{encode, read_expected, Command, Reply, StoreMode, ValueRecord};
use crate::transport::{Transport, TransportStats};

/// Blocking client bound to a single connection
pub struct Client<S: Read + Write = TcpStream> {
    transport: Transport<S>,
    limits: Limits,
    broken: bool,
}

impl Client<TcpStream> {
    /// Connect with default configuration
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::with_config(Config::builder().server_addr(addr).build())
    }

    /// Connect with a custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let transport = Transport::connect(&config)?;
        Ok(Self {
            transport,
            limits: config.limits,
            broken: false,
        })
    }
}

impl<S: Read + Write> Client<S> {
    /// Build a client over an already connected stream
    pub fn from_stream(stream: S, limits: Limits) -> Self {
        Self {
            transport: Transport::new(stream),
            limits,
            broken: false,
        }
    }

    /// Limits enforced before sending
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// True once a transport failure has made this connection unusable
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Byte and command counters of the underlying transport
    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        self.transport.get_ref()
    }

    // =========================================================================
    // Storage Commands
    // =========================================================================

    /// Store a value unconditionally
    ///
    /// `exptime` is forwarded as given: 0 never expires, up to 30 days is
    /// relative, anything larger is an absolute UNIX time.
    pub fn set(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32, noreply: bool) -> Result<()> {
        self.store(StoreMode::Set, key, value, flags, exptime, noreply)
    }

    /// Store only if the key is absent
    pub fn add(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32, noreply: bool) -> Result<()> {
        self.store(StoreMode::Add, key, value, flags, exptime, noreply)
    }

    /// Store only if the key is present
    pub fn replace(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32, noreply: bool) -> Result<()> {
        self.store(StoreMode::Replace, key, value, flags, exptime, noreply)
    }

    /// Append bytes to an existing value
    pub fn append(&mut self, key: &[u8], value: &[u8], noreply: bool) -> Result<()> {
        self.store(StoreMode::Append, key, value, 0, 0, noreply)
    }

    /// Prepend bytes to an existing value
    pub fn prepend(&mut self, key: &[u8], value: &[u8], noreply: bool) -> Result<()> {
        self.store(StoreMode::Prepend, key, value, 0, 0, noreply)
    }

    /// Store only if the item still has version `unique` (see [`Client::gets`])
    pub fn cas(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u32,
        unique: u64,
        noreply: bool,
    ) -> Result<()> {
        let command = Command::Store {
            mode: StoreMode::Cas { unique },
            key,
            value,
            flags,
            exptime,
            noreply,
        };
        self.call(&command, |reply| match reply {
            None | Some(Reply::Stored) => Ok(()),
            Some(Reply::Exists) => Err(EmcError::CasConflict),
            Some(Reply::NotFound) => Err(EmcError::NotFound),
            Some(other) => store_failure(other),
        })
    }

    fn store(
        &mut self,
        mode: StoreMode,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u32,
        noreply: bool,
    ) -> Result<()> {
        let command = Command::Store {
            mode,
            key,
            value,
            flags,
            exptime,
            noreply,
        };
        self.call(&command, |reply| match reply {
            None | Some(Reply::Stored) => Ok(()),
            Some(other) => store_failure(other),
        })
    }

    // =========================================================================
    // Retrieval Commands
    // =========================================================================

    /// Fetch one item
    ///
    /// Returns `EmcError::NotFound` when the server has no live item.
    pub fn get(&mut self, key: &[u8]) -> Result<Item> {
        self.retrieve_one(Command::Get { keys: vec![key] }, key)
    }

    /// Fetch one item together with its version token
    pub fn gets(&mut self, key: &[u8]) -> Result<Item> {
        self.retrieve_one(Command::Gets { keys: vec![key] }, key)
    }

    /// Fetch many items in one round trip
    ///
    /// Missing keys are simply absent from the map; zero hits yields an
    /// empty map rather than an error.
    pub fn get_multi(&mut self, keys: &[&[u8]]) -> Result<HashMap<Vec<u8>, Item>> {
        self.retrieve_many(Command::Get { keys: keys.to_vec() }, keys)
    }

    /// Like [`Client::get_multi`], with version tokens
    pub fn gets_multi(&mut self, keys: &[&[u8]]) -> Result<HashMap<Vec<u8>, Item>> {
        self.retrieve_many(Command::Gets { keys: keys.to_vec() }, keys)
    }

    fn retrieve_one(&mut self, command: Command<'_>, key: &[u8]) -> Result<Item> {
        let records = self.call(&command, expect_values)?;
        records
            .into_iter()
            .find(|record| record.key == key)
            .map(into_item)
            .ok_or(EmcError::NotFound)
    }

    fn retrieve_many(&mut self, command: Command<'_>, keys: &[&[u8]]) -> Result<HashMap<Vec<u8>, Item>> {
        let records = self.call(&command, expect_values)?;

        let mut items = HashMap::with_capacity(records.len());
        for record in records {
            if !keys.iter().any(|key| *key == record.key.as_slice()) {
                tracing::warn!(
                    "Ignoring value for unrequested key {:?}",
                    String::from_utf8_lossy(&record.key)
                );
                continue;
            }
            let key = record.key.clone();
            items.insert(key, into_item(record));
        }

        tracing::debug!("Multi-get hit {} of {} keys", items.len(), keys.len());
        Ok(items)
    }

    // =========================================================================
    // Other Commands
    // =========================================================================

    /// Remove an item
    ///
    /// Returns `EmcError::DeleteFailed` when the server had nothing to delete.
    pub fn delete(&mut self, key: &[u8], noreply: bool) -> Result<()> {
        self.call(&Command::Delete { key, noreply }, |reply| match reply {
            None | Some(Reply::Deleted) => Ok(()),
            Some(Reply::NotFound) => Err(EmcError::DeleteFailed),
            Some(other) => server_failure(other),
        })
    }

    /// Increment a decimal value, returning the new value
    pub fn incr(&mut self, key: &[u8], delta: u64) -> Result<u64> {
        self.call(&Command::Incr { key, delta }, expect_counter)
    }

    /// Decrement a decimal value, returning the new value
    pub fn decr(&mut self, key: &[u8], delta: u64) -> Result<u64> {
        self.call(&Command::Decr { key, delta }, expect_counter)
    }

    /// Update the expiration of an item without fetching it
    pub fn touch(&mut self, key: &[u8], exptime: u32, noreply: bool) -> Result<()> {
        self.call(&Command::Touch { key, exptime, noreply }, |reply| match reply {
            None | Some(Reply::Touched) => Ok(()),
            Some(Reply::NotFound) => Err(EmcError::NotFound),
            Some(other) => server_failure(other),
        })
    }

    /// Invalidate every item, now or after `delay` seconds
    pub fn flush_all(&mut self, delay: Option<u32>, noreply: bool) -> Result<()> {
        self.call(&Command::FlushAll { delay, noreply }, |reply| match reply {
            None | Some(Reply::Ok) => Ok(()),
            Some(other) => server_failure(other),
        })
    }

    /// Server version string
    pub fn version(&mut self) -> Result<String> {
        self.call(&Command::Version, |reply| match reply {
            Some(Reply::Version(version)) => Ok(version),
            Some(other) => server_failure(other),
            None => Err(missing_reply()),
        })
    }

    /// General statistics as name/value pairs, in server order
    pub fn stats(&mut self) -> Result<Vec<(String, String)>> {
        self.call(&Command::Stats, |reply| match reply {
            Some(Reply::Stats(stats)) => Ok(stats),
            Some(other) => server_failure(other),
            None => Err(missing_reply()),
        })
    }

    /// Ask the server to close the connection
    pub fn quit(mut self) -> Result<()> {
        self.call(&Command::Quit, |_| Ok(()))
    }

    // =========================================================================
    // Request/Response Cycle
    // =========================================================================

    /// Run one request/response cycle and map the reply
    ///
    /// Validation errors leave the connection usable; any transport error,
    /// including from `map`, marks it broken.
    fn call<T, F>(&mut self, command: &Command<'_>, map: F) -> Result<T>
    where
        F: FnOnce(Option<Reply>) -> Result<T>,
    {
        if self.broken {
            return Err(TransportError::Broken.into());
        }

        let frame = encode(command, &self.limits)?;
        tracing::debug!("Sending {} ({} bytes)", command.name(), frame.len());

        let result = self
            .exchange(command, &frame)
            .and_then(map);

        if let Err(ref e) = result {
            if e.is_transport() {
                tracing::warn!("Connection unusable after {} failed: {}", command.name(), e);
                self.broken = true;
            } else {
                tracing::debug!("{} failed: {}", command.name(), e);
            }
        }
        result
    }

    fn exchange(&mut self, command: &Command<'_>, frame: &[u8]) -> Result<Option<Reply>> {
        self.transport.send(frame)?;
        read_expected(&mut self.transport, command.reply_shape())
    }
}

// =============================================================================
// Reply Mapping
// =============================================================================

fn expect_values(reply: Option<Reply>) -> Result<Vec<ValueRecord>> {
    match reply {
        Some(Reply::Values(records)) => Ok(records),
        Some(other) => server_failure(other),
        None => Err(missing_reply()),
    }
}

fn expect_counter(reply: Option<Reply>) -> Result<u64> {
    match reply {
        Some(Reply::Counter(value)) => Ok(value),
        Some(Reply::NotFound) => Err(EmcError::NotFound),
        Some(other) => server_failure(other),
        None => Err(missing_reply()),
    }
}

/// Any non-STORED answer to a store is a set failure carrying the server text
fn store_failure<T>(reply: Reply) -> Result<T> {
    if reply.is_status() {
        Err(EmcError::SetFailed(reply.describe()))
    } else {
        Err(EmcError::unexpected(reply.describe()))
    }
}

fn server_failure<T>(reply: Reply) -> Result<T> {
    match reply {
        Reply::Error => Err(EmcError::Server("ERROR".to_string())),
        Reply::ClientError(msg) => Err(EmcError::Server(format!("CLIENT_ERROR {}", msg))),
        Reply::ServerError(msg) => Err(EmcError::Server(format!("SERVER_ERROR {}", msg))),
        other => Err(EmcError::unexpected(other.describe())),
    }
}

fn missing_reply() -> EmcError {
    EmcError::unexpected("no reply for a command that expects one")
}

fn into_item(record: ValueRecord) -> Item {
    Item::new(record.value, record.flags, record.cas)
}

// =============================================================================
// Shared Client
// =============================================================================

/// A client shareable across threads
///
/// Calls are serialized through a mutex, so one connection never carries two
/// outstanding requests. Clones share the same connection.
pub struct SharedClient<S: Read + Write = TcpStream> {
    inner: Arc<Mutex<Client<S>>>,
}

impl<S: Read + Write> Clone for SharedClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedClient<TcpStream> {
    /// Connect with a custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Client::with_config(config).map(Self::new)
    }
}

impl<S: Read + Write> SharedClient<S> {
    pub fn new(client: Client<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    /// Run several calls under one lock acquisition
    pub fn with<T>(&self, f: impl FnOnce(&mut Client<S>) -> T) -> T {
        let mut client = self.inner.lock();
        f(&mut client)
    }

    pub fn is_broken(&self) -> bool {
        self.inner.lock().is_broken()
    }

    pub fn set(&self, key: &[u8], value: &[u8], flags: u32, exptime: u32, noreply: bool) -> Result<()> {
        self.inner.lock().set(key, value, flags, exptime, noreply)
    }

    pub fn get(&self, key: &[u8]) -> Result<Item> {
        self.inner.lock().get(key)
    }

    pub fn get_multi(&self, keys: &[&[u8]]) -> Result<HashMap<Vec<u8>, Item>> {
        self.inner.lock().get_multi(keys)
    }

    pub fn delete(&self, key: &[u8], noreply: bool) -> Result<()> {
        self.inner.lock().delete(key, noreply)
    }
}
