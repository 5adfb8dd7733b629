//! Configuration for emcache
//!
//! Centralized configuration with sensible defaults. Protocol limits are
//! exported as named constants and carried per connection in [`Limits`].

/// Longest key the protocol accepts (memcached standard)
pub const MAX_KEY_LEN: usize = 250;

/// Largest value accepted by a default server slab (1 MiB)
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Expiration values above this many seconds (30 days) are absolute UNIX
/// timestamps, values at or below are relative. Servers apply it, the
/// client forwards `exptime` untouched.
pub const RELATIVE_EXPTIME_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Longest status or header line the transport will buffer
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Size limits enforced before any bytes reach the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum key length in bytes
    pub max_key_len: usize,

    /// Maximum value length in bytes
    pub max_value_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_key_len: MAX_KEY_LEN,
            max_value_len: MAX_VALUE_LEN,
        }
    }
}

/// Main configuration for a client connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address (host:port)
    pub server_addr: String,

    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Protocol Limits
    // -------------------------------------------------------------------------
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:11211".to_string(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            nodelay: true,
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Set the maximum key length (in bytes)
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.config.limits.max_key_len = len;
        self
    }

    /// Set the maximum value length (in bytes)
    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.limits.max_value_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
