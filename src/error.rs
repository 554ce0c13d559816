//! The single error type shared by records, readers, writers and joins.
//!
//! End of input is not an error: readers return `Ok(None)` once a source is
//! exhausted. Everything else that can go wrong is one of the variants below.

use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = TsvError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TsvError {
    /// Header and first data row disagree on the column count (beyond the
    /// single missing rowname column that is tolerated).
    #[error("not a valid delimited file: {source_name} header has {header} columns, first row has {row}")]
    Schema {
        source_name: String,
        header: usize,
        row: usize,
    },

    /// A field was looked up by a name the record does not declare.
    #[error("record contains no '{0}' field")]
    Lookup(String),

    /// A positional write outside the record's current bounds.
    #[error("index {index} out of range for record of length {len}")]
    Index { index: usize, len: usize },

    /// Misuse of a record's name schema (attached twice, wrong length, duplicates).
    #[error("invalid field names: {0}")]
    Names(String),

    /// The underlying stream failed; `context` names the operation and path.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A compression codec could not be set up for a path.
    #[error("codec setup failed: {0:#}")]
    Codec(anyhow::Error),

    /// Invalid join configuration, or a join aborted by its error policy.
    #[error("join failed: {0}")]
    Join(String),

    /// Configuration could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl TsvError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        TsvError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is a failed name lookup.
    pub fn is_lookup(&self) -> bool {
        matches!(self, TsvError::Lookup(_))
    }
}

/// Attach a lazily-built context string to I/O results.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| TsvError::io(f(), e))
    }
}

/// Split an `anyhow` error from the I/O layer back into an I/O or codec error.
pub(crate) fn from_io_layer(e: anyhow::Error) -> TsvError {
    let context = e.to_string();
    match e.downcast::<io::Error>() {
        Ok(source) => TsvError::Io { context, source },
        Err(e) => TsvError::Codec(e),
    }
}
