//! Shared test helpers
//!
//! - `ScriptedStream`: in-memory stream replaying canned server bytes
//! - `FakeServer`: in-process memcached speaking the text protocol over TCP

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

// =============================================================================
// Scripted Stream
// =============================================================================

/// Stream whose reads come from a fixed script and whose writes are recorded
pub struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,

    /// Largest read/write the stream accepts in one call
    chunk: usize,

    /// Error returned by reads once the script is exhausted (EOF otherwise)
    on_exhausted: Option<io::ErrorKind>,

    /// Error returned by every write
    write_error: Option<io::ErrorKind>,
}

impl ScriptedStream {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: Cursor::new(input.into()),
            output: Vec::new(),
            chunk: usize::MAX,
            on_exhausted: None,
            write_error: None,
        }
    }

    /// Accept at most `chunk` bytes per read and write call
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Simulate a socket timeout once the script runs out
    pub fn timing_out(mut self) -> Self {
        self.on_exhausted = Some(io::ErrorKind::WouldBlock);
        self
    }

    /// Fail every write with `kind`
    pub fn failing_writes(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = buf.len().min(self.chunk);
        let n = self.input.read(&mut buf[..limit])?;
        if n == 0 {
            if let Some(kind) = self.on_exhausted {
                return Err(io::Error::new(kind, "scripted timeout"));
            }
        }
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error {
            return Err(io::Error::new(kind, "scripted write failure"));
        }
        let n = buf.len().min(self.chunk);
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Fake Server
// =============================================================================

const THIRTY_DAYS: u64 = 60 * 60 * 24 * 30;
const SERVER_ITEM_MAX: usize = 1024 * 1024;
const SERVER_KEY_MAX: usize = 250;

struct Entry {
    value: Vec<u8>,
    flags: u32,
    cas: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

#[derive(Default)]
struct Store {
    items: HashMap<Vec<u8>, Entry>,
    next_cas: u64,
}

impl Store {
    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        if self.items.get(key).map_or(false, |e| !e.is_live()) {
            self.items.remove(key);
        }
        self.items.get_mut(key)
    }

    fn bump_cas(&mut self) -> u64 {
        self.next_cas += 1;
        self.next_cas
    }
}

/// Memcached stand-in listening on an ephemeral localhost port
pub struct FakeServer {
    pub addr: String,
}

impl FakeServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let store = Arc::new(Mutex::new(Store::default()));

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let _ = serve(stream, store);
                });
            }
        });

        Self { addr }
    }
}

fn expiry(exptime: u64) -> Option<Instant> {
    if exptime == 0 {
        return None;
    }
    if exptime <= THIRTY_DAYS {
        return Some(Instant::now() + Duration::from_secs(exptime));
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock");
    let target = Duration::from_secs(exptime);
    Some(Instant::now() + target.saturating_sub(now))
}

fn serve(stream: TcpStream, store: Arc<Mutex<Store>>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if line.len() < 2 || line[line.len() - 2] != b'\r' {
            writer.write_all(b"ERROR\r\n")?;
            continue;
        }
        line.truncate(line.len() - 2);

        let words: Vec<Vec<u8>> = line
            .split(|&b| b == b' ')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_vec())
            .collect();
        if words.is_empty() {
            writer.write_all(b"ERROR\r\n")?;
            continue;
        }

        let noreply = words.last().map_or(false, |w| w == b"noreply");
        let reply = match words[0].as_slice() {
            b"set" | b"add" | b"replace" | b"append" | b"prepend" | b"cas" => {
                handle_store(&words, &mut reader, &store)?
            }
            b"get" | b"gets" => handle_get(&words, &store),
            b"delete" => {
                let mut store = store.lock();
                if store.live(&words[1]).is_some() {
                    store.items.remove(&words[1]);
                    b"DELETED\r\n".to_vec()
                } else {
                    b"NOT_FOUND\r\n".to_vec()
                }
            }
            b"incr" | b"decr" => handle_counter(&words, &store),
            b"touch" => {
                let exptime = number(&words[2]);
                let mut store = store.lock();
                match store.live(&words[1]) {
                    Some(entry) => {
                        entry.expires_at = expiry(exptime);
                        b"TOUCHED\r\n".to_vec()
                    }
                    None => b"NOT_FOUND\r\n".to_vec(),
                }
            }
            b"flush_all" => {
                store.lock().items.clear();
                b"OK\r\n".to_vec()
            }
            b"version" => b"VERSION 1.6.21-fake\r\n".to_vec(),
            b"stats" => {
                let count = store.lock().items.len();
                format!("STAT pid 4242\r\nSTAT curr_items {}\r\nEND\r\n", count).into_bytes()
            }
            b"quit" => return Ok(()),
            _ => b"ERROR\r\n".to_vec(),
        };

        if !noreply {
            writer.write_all(&reply)?;
        }
    }
}

fn number(word: &[u8]) -> u64 {
    std::str::from_utf8(word).ok().and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn handle_store(
    words: &[Vec<u8>],
    reader: &mut BufReader<TcpStream>,
    store: &Arc<Mutex<Store>>,
) -> io::Result<Vec<u8>> {
    let key = words[1].clone();
    let flags = number(&words[2]) as u32;
    let exptime = number(&words[3]);
    let len = number(&words[4]) as usize;

    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data)?;
    if !data.ends_with(b"\r\n") {
        return Ok(b"CLIENT_ERROR bad data chunk\r\n".to_vec());
    }
    data.truncate(len);

    if key.len() > SERVER_KEY_MAX {
        return Ok(b"CLIENT_ERROR key too long\r\n".to_vec());
    }
    if len > SERVER_ITEM_MAX {
        return Ok(b"SERVER_ERROR object too large for cache\r\n".to_vec());
    }

    let mut store = store.lock();
    let cas = store.bump_cas();
    let existing = store.live(&key).map(|e| e.cas);

    let stored = match words[0].as_slice() {
        b"set" => true,
        b"add" => existing.is_none(),
        b"replace" => existing.is_some(),
        b"append" | b"prepend" => {
            let prepend = words[0] == b"prepend";
            if let Some(entry) = store.live(&key) {
                if prepend {
                    data.extend_from_slice(&entry.value);
                    entry.value = data;
                } else {
                    entry.value.extend_from_slice(&data);
                }
                entry.cas = cas;
                return Ok(b"STORED\r\n".to_vec());
            }
            return Ok(b"NOT_STORED\r\n".to_vec());
        }
        b"cas" => match existing {
            None => return Ok(b"NOT_FOUND\r\n".to_vec()),
            Some(current) if current != number(&words[5]) => return Ok(b"EXISTS\r\n".to_vec()),
            Some(_) => true,
        },
        _ => false,
    };

    if !stored {
        return Ok(b"NOT_STORED\r\n".to_vec());
    }
    store.items.insert(
        key,
        Entry {
            value: data,
            flags,
            cas,
            expires_at: expiry(exptime),
        },
    );
    Ok(b"STORED\r\n".to_vec())
}

fn handle_get(words: &[Vec<u8>], store: &Arc<Mutex<Store>>) -> Vec<u8> {
    let with_cas = words[0] == b"gets";
    let mut store = store.lock();
    let mut out = Vec::new();
    for key in &words[1..] {
        if let Some(entry) = store.live(key) {
            out.extend_from_slice(b"VALUE ");
            out.extend_from_slice(key);
            out.extend_from_slice(format!(" {} {}", entry.flags, entry.value.len()).as_bytes());
            if with_cas {
                out.extend_from_slice(format!(" {}", entry.cas).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&entry.value);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b"END\r\n");
    out
}

fn handle_counter(words: &[Vec<u8>], store: &Arc<Mutex<Store>>) -> Vec<u8> {
    let delta = number(&words[2]);
    let incr = words[0] == b"incr";
    let mut store = store.lock();
    let cas = store.bump_cas();
    match store.live(&words[1]) {
        Some(entry) => {
            let current = match std::str::from_utf8(&entry.value).ok().and_then(|s| s.parse::<u64>().ok()) {
                Some(v) => v,
                None => {
                    return b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n".to_vec()
                }
            };
            let next = if incr {
                current.wrapping_add(delta)
            } else {
                current.saturating_sub(delta)
            };
            entry.value = next.to_string().into_bytes();
            entry.cas = cas;
            format!("{}\r\n", next).into_bytes()
        }
        None => b"NOT_FOUND\r\n".to_vec(),
    }
}

// =============================================================================
// Data Helpers
// =============================================================================

/// Printable key unique within the test process
pub fn unique_key(prefix: &str, len: usize) -> Vec<u8> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut key = format!("{}{}_", prefix, id).into_bytes();
    while key.len() < len {
        key.push(b'a' + (key.len() % 26) as u8);
    }
    key.truncate(len.max(1));
    key
}

/// Deterministic binary payload including CR and LF bytes
pub fn binary_value(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
