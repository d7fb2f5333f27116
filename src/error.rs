//! Error types for the resources store

use crate::info::OpenMode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failures while obtaining a connection from the registry
#[derive(Error, Debug)]
pub enum Error {
    /// The read-only connection could not be opened. Read paths should degrade
    /// gracefully ("no data available").
    #[error("read-only connection '{connection}' is unavailable: {source}")]
    ReadOnlyUnavailable {
        connection: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The read-write connection could not be opened. The store cannot provide
    /// its write path; the service is expected to terminate.
    #[error("read-write connection '{connection}' could not be opened: {source}")]
    ReadWriteUnavailable {
        connection: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    pub(crate) fn unavailable(mode: OpenMode, connection: String, source: rusqlite::Error) -> Self {
        match mode {
            OpenMode::ReadOnly => Error::ReadOnlyUnavailable { connection, source },
            OpenMode::ReadWrite => Error::ReadWriteUnavailable { connection, source },
        }
    }

    /// Whether the error leaves the store without a write path
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ReadWriteUnavailable { .. })
    }
}

/// A failed statement, as delivered to the error sink and kept on the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryError {
    /// Text of the statement that failed
    pub statement: String,
    /// Extended SQLite result code, when the engine reported one
    pub code: Option<i32>,
    /// Engine-reported message
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(statement: &str, error: &rusqlite::Error) -> Self {
        let code = match error {
            rusqlite::Error::SqliteFailure(ffi, _) => Some(ffi.extended_code),
            _ => None,
        };
        Self {
            statement: statement.to_string(),
            code,
            message: error.to_string(),
        }
    }

    pub(crate) fn message(statement: &str, message: impl Into<String>) -> Self {
        Self {
            statement: statement.to_string(),
            code: None,
            message: message.into(),
        }
    }

    /// True when the engine refused the statement because the connection is read-only
    pub fn is_read_only(&self) -> bool {
        // SQLITE_READONLY and all its extended codes share the primary code 8
        self.code.map_or(false, |code| code & 0xff == 8)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (query: {})", self.message, self.statement)
    }
}

impl std::error::Error for QueryError {}

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
