//! emcache CLI Client
//!
//! Command-line interface for talking to a memcached-compatible server.

use std::io::Write;

use clap::{Parser, Subcommand};
use emcache::{Client, Config, Item};
use tracing_subscriber::{fmt, EnvFilter};

/// emcache CLI
#[derive(Parser, Debug)]
#[command(name = "emcache-cli")]
#[command(about = "CLI for memcached-compatible cache servers")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    server: String,

    /// Connect/read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Get a value and its CAS token
    Gets {
        /// The key to get
        key: String,
    },

    /// Get several keys in one request
    Mget {
        /// The keys to get
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set a key-value pair
    Set {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Store only if the key does not exist
    Add {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Store only if the key exists
    Replace {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Append to an existing value
    Append {
        key: String,
        value: String,
    },

    /// Prepend to an existing value
    Prepend {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,

        /// Do not wait for the server's acknowledgement
        #[arg(long)]
        noreply: bool,
    },

    /// Increment a counter
    Incr {
        key: String,
        #[arg(default_value = "1")]
        delta: u64,
    },

    /// Decrement a counter
    Decr {
        key: String,
        #[arg(default_value = "1")]
        delta: u64,
    },

    /// Change a key's expiration
    Touch {
        key: String,
        exptime: u32,
    },

    /// Invalidate all items
    Flush {
        /// Delay in seconds before the flush takes effect
        #[arg(long)]
        delay: Option<u32>,
    },

    /// Print the server version
    Version,

    /// Print server statistics
    Stats,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// The key to set
    key: String,

    /// The value to set
    value: String,

    /// Opaque flags stored with the value
    #[arg(short, long, default_value = "0")]
    flags: u32,

    /// Expiration: seconds from now, or a UNIX time beyond 30 days
    #[arg(short, long, default_value = "0")]
    exptime: u32,

    /// Do not wait for the server's acknowledgement
    #[arg(long)]
    noreply: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,emcache=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .server_addr(&args.server)
        .connect_timeout_ms(args.timeout_ms)
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms)
        .build();

    let mut client = match Client::with_config(config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&mut client, args.command) {
        eprintln!("error ({:?}): {}", e.kind(), e);
        std::process::exit(1);
    }
}

fn run(client: &mut Client, command: Commands) -> emcache::Result<()> {
    match command {
        Commands::Get { key } => print_item(&key, &client.get(key.as_bytes())?),
        Commands::Gets { key } => print_item(&key, &client.gets(key.as_bytes())?),
        Commands::Mget { keys } => {
            let requested: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
            let items = client.get_multi(&requested)?;
            for key in &keys {
                match items.get(key.as_bytes()) {
                    Some(item) => print_item(key, item),
                    None => println!("{}: (miss)", key),
                }
            }
        }
        Commands::Set { store } => {
            client.set(store.key.as_bytes(), store.value.as_bytes(), store.flags, store.exptime, store.noreply)?;
            println!("STORED");
        }
        Commands::Add { store } => {
            client.add(store.key.as_bytes(), store.value.as_bytes(), store.flags, store.exptime, store.noreply)?;
            println!("STORED");
        }
        Commands::Replace { store } => {
            client.replace(store.key.as_bytes(), store.value.as_bytes(), store.flags, store.exptime, store.noreply)?;
            println!("STORED");
        }
        Commands::Append { key, value } => {
            client.append(key.as_bytes(), value.as_bytes(), false)?;
            println!("STORED");
        }
        Commands::Prepend { key, value } => {
            client.prepend(key.as_bytes(), value.as_bytes(), false)?;
            println!("STORED");
        }
        Commands::Del { key, noreply } => {
            client.delete(key.as_bytes(), noreply)?;
            println!("DELETED");
        }
        Commands::Incr { key, delta } => println!("{}", client.incr(key.as_bytes(), delta)?),
        Commands::Decr { key, delta } => println!("{}", client.decr(key.as_bytes(), delta)?),
        Commands::Touch { key, exptime } => {
            client.touch(key.as_bytes(), exptime, false)?;
            println!("TOUCHED");
        }
        Commands::Flush { delay } => {
            client.flush_all(delay, false)?;
            println!("OK");
        }
        Commands::Version => println!("{}", client.version()?),
        Commands::Stats => {
            for (name, value) in client.stats()? {
                println!("{} {}", name, value);
            }
        }
    }
    Ok(())
}

fn print_item(key: &str, item: &Item) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{} (flags={}", key, item.flags);
    if let Some(cas) = item.cas {
        let _ = write!(out, ", cas={}", cas);
    }
    let _ = write!(out, "): ");
    let _ = out.write_all(&item.value);
    let _ = writeln!(out);
}
