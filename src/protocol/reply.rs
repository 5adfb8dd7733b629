//! Reply definitions
//!
//! A reply is decoded from the first token of the first line, which selects
//! one [`Keyword`]; the keyword fixes how much more of the stream belongs to
//! the same reply.

/// First token of a server line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Value,
    End,
    Stat,
    Version,
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Ok,
    Error,
    ClientError,
    ServerError,
}

impl Keyword {
    /// Match a token against the closed vocabulary
    pub fn parse(token: &[u8]) -> Option<Keyword> {
        let keyword = match token {
            b"VALUE" => Keyword::Value,
            b"END" => Keyword::End,
            b"STAT" => Keyword::Stat,
            b"VERSION" => Keyword::Version,
            b"STORED" => Keyword::Stored,
            b"NOT_STORED" => Keyword::NotStored,
            b"EXISTS" => Keyword::Exists,
            b"NOT_FOUND" => Keyword::NotFound,
            b"DELETED" => Keyword::Deleted,
            b"TOUCHED" => Keyword::Touched,
            b"OK" => Keyword::Ok,
            b"ERROR" => Keyword::Error,
            b"CLIENT_ERROR" => Keyword::ClientError,
            b"SERVER_ERROR" => Keyword::ServerError,
            _ => return None,
        };
        Some(keyword)
    }
}

/// One `VALUE` record of a retrieval reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub key: Vec<u8>,
    pub flags: u32,
    pub value: Vec<u8>,
    pub cas: Option<u64>,
}

/// A fully decoded server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Ok,

    /// Unknown command
    Error,

    /// Malformed request, with the server's reason
    ClientError(String),

    /// Server-side failure, with the server's reason
    ServerError(String),

    /// Zero or more records; empty when the server answered `END` alone
    Values(Vec<ValueRecord>),

    /// New value after incr/decr
    Counter(u64),

    Version(String),

    Stats(Vec<(String, String)>),
}

impl Reply {
    /// True for `ERROR`, `CLIENT_ERROR` and `SERVER_ERROR`
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error | Reply::ClientError(_) | Reply::ServerError(_))
    }

    /// True for replies made of a single status line
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            Reply::Stored
                | Reply::NotStored
                | Reply::Exists
                | Reply::NotFound
                | Reply::Deleted
                | Reply::Touched
                | Reply::Ok
        ) || self.is_error()
    }

    /// Server text for this reply, as it appeared on the wire
    pub fn describe(&self) -> String {
        match self {
            Reply::Stored => "STORED".to_string(),
            Reply::NotStored => "NOT_STORED".to_string(),
            Reply::Exists => "EXISTS".to_string(),
            Reply::NotFound => "NOT_FOUND".to_string(),
            Reply::Deleted => "DELETED".to_string(),
            Reply::Touched => "TOUCHED".to_string(),
            Reply::Ok => "OK".to_string(),
            Reply::Error => "ERROR".to_string(),
            Reply::ClientError(msg) => format!("CLIENT_ERROR {}", msg),
            Reply::ServerError(msg) => format!("SERVER_ERROR {}", msg),
            Reply::Values(records) => format!("{} VALUE record(s)", records.len()),
            Reply::Counter(value) => value.to_string(),
            Reply::Version(version) => format!("VERSION {}", version),
            Reply::Stats(stats) => format!("{} STAT line(s)", stats.len()),
        }
    }
}
