//! Unified error type for the indexer and the query tool.

use thiserror::Error;

/// All errors that can occur while indexing or querying.
#[derive(Error, Debug)]
pub enum IndexError {
    /// An expected-negative lookup result. Drives control flow, never logged
    /// as an error.
    #[error("not found")]
    NotFound,

    /// Multiple non-equal matches where exactly one was required.
    #[error("ambiguous typename")]
    Ambiguous,

    /// A mutating call on a read-only store.
    #[error("store is read-only")]
    PermissionDenied,

    /// Malformed CLI argument or query.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Integer out of representable range (e.g. a negative durable id read
    /// back from disk).
    #[error("value out of range: {0}")]
    Range(String),

    /// A durable-store invariant violated: wrong column type, referenced id
    /// missing. Logged distinctively; never fatal by itself.
    #[error("index corruption: {0}")]
    Corruption(String),

    /// Allocation or descriptor exhaustion.
    #[error("resource exhausted: {0}")]
    Exhausted(String),

    /// Opaque error from the database driver.
    #[error("database error: {0}")]
    Db(rusqlite::Error),

    /// Opaque error from the C frontend.
    #[error("frontend error: {0}")]
    Frontend(String),

    /// I/O error (source file read, database file access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feature the indexer knows about but does not implement.
    /// Logged, node skipped.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IndexError>;

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            // An empty SELECT is an expected-negative result, not a failure.
            rusqlite::Error::QueryReturnedNoRows => IndexError::NotFound,
            other => IndexError::Db(other),
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::InvalidInput(format!("compile commands: {err}"))
    }
}

impl IndexError {
    /// Whether the whole run must stop. Everything else is logged and the
    /// current node skipped; siblings continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexError::Exhausted(_) | IndexError::PermissionDenied)
    }

    /// Map to a `sysexits`-style process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexError::InvalidInput(_) => exit::USAGE,
            IndexError::NotFound | IndexError::Ambiguous => exit::DATAERR,
            IndexError::Corruption(_) | IndexError::Range(_) => exit::DATAERR,
            IndexError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => exit::NOINPUT,
            IndexError::Io(_) => exit::IOERR,
            IndexError::PermissionDenied => exit::CANTCREAT,
            IndexError::Exhausted(_) => exit::OSERR,
            _ => exit::SOFTWARE,
        }
    }
}

/// `sysexits.h` exit codes used by both binaries.
pub mod exit {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 64;
    pub const DATAERR: i32 = 65;
    pub const NOINPUT: i32 = 66;
    pub const SOFTWARE: i32 = 70;
    pub const OSERR: i32 = 71;
    pub const CANTCREAT: i32 = 73;
    pub const IOERR: i32 = 74;
}
