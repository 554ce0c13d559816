//! Delimited text writer.
//!
//! [`TsvWriter`] writes one newline-terminated line per call. With declared
//! column names, [`TsvWriter::write_record`] projects each record onto those
//! names, so a writer can reorder or subset a reader's schema:
//!
//! ```no_run
//! use tsvflow::{ReaderOptions, TsvReader, TsvWriter, WriterOptions};
//! # fn main() -> tsvflow::Result<()> {
//! let reader = TsvReader::open("genes.tsv", ReaderOptions::default())?;
//! let mut out = TsvWriter::create("subset.tsv.gz", WriterOptions::default())?;
//! out.set_names(["symbol", "ROWNAME"]);
//! out.write_header()?;
//! for row in reader {
//!     out.write_record(&row?)?;
//! }
//! out.close()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{IoContext, Result, from_io_layer};
use crate::format::DEFAULT_DELIMITER;
use crate::io::compression::{EncodedWrite, create_encoded};
use crate::record::Record;
use std::fmt::{self, Display};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub delimiter: String,
    /// Add to existing content instead of truncating.
    pub append: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            append: false,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

/// Line-per-call sink for delimited text.
pub struct TsvWriter {
    out: Box<dyn EncodedWrite>,
    label: String,
    delimiter: String,
    names: Vec<String>,
}

impl TsvWriter {
    /// Create (or append to) `path`, compressing by suffix. Parent
    /// directories are created as needed.
    pub fn create(path: impl AsRef<Path>, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let out = create_encoded(path, options.append).map_err(from_io_layer)?;
        log::debug!(
            "writing {} ({})",
            path.display(),
            if options.append { "append" } else { "truncate" }
        );
        Ok(Self {
            out,
            label: path.display().to_string(),
            delimiter: options.delimiter,
            names: Vec::new(),
        })
    }

    /// Write to an arbitrary sink through a buffer. `options.append` is
    /// irrelevant here.
    pub fn from_writer<W: Write + 'static>(writer: W, options: WriterOptions) -> Self {
        Self {
            out: Box::new(BufWriter::new(writer)),
            label: "<stream>".to_string(),
            delimiter: options.delimiter,
            names: Vec::new(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Declared output columns.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Declare output columns; records written afterwards are projected onto them.
    pub fn set_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
    }

    /// Write the declared names as a header line. No-op without names.
    pub fn write_header(&mut self) -> Result<()> {
        if self.names.is_empty() {
            return Ok(());
        }
        let line = self.names.join(&self.delimiter);
        self.write_line(&line)
    }

    /// Write `render(names)` verbatim as the header line. No-op without names.
    pub fn write_header_with<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&[String]) -> String,
    {
        if self.names.is_empty() {
            return Ok(());
        }
        let line = render(&self.names);
        self.write_line(&line)
    }

    /// Write `names` as a header line without changing the declared columns.
    pub fn write_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let line = names
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&self.delimiter);
        self.write_line(&line)
    }

    /// Write a raw sequence of values positionally.
    pub fn write_row<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let line = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(&self.delimiter);
        self.write_line(&line)
    }

    /// Write a record, in its own order or projected onto the declared names.
    ///
    /// # Errors
    /// A [`crate::TsvError::Lookup`] if a declared name is missing from the
    /// record; nothing is written in that case.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.names.is_empty() {
            let line = record.values().join(&self.delimiter);
            return self.write_line(&line);
        }
        let projected = self
            .names
            .iter()
            .map(|n| record.field(n))
            .collect::<Result<Vec<_>>>()?;
        let line = projected.join(&self.delimiter);
        self.write_line(&line)
    }

    /// Write `text` exactly as given, without a terminator.
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .io_context(|| format!("write {}", self.label))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .io_context(|| format!("flush {}", self.label))
    }

    /// Flush, write the codec trailer of compressed output and release the sink.
    ///
    /// Dropping a writer without closing it still finalizes the output, but
    /// any error on that path is lost.
    pub fn close(self) -> Result<()> {
        let TsvWriter { out, label, .. } = self;
        out.finish().io_context(|| format!("finish {label}"))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.write_all(b"\n"))
            .io_context(|| format!("write {}", self.label))
    }
}

impl fmt::Debug for TsvWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsvWriter")
            .field("sink", &self.label)
            .field("delimiter", &self.delimiter)
            .field("names", &self.names)
            .finish()
    }
}
