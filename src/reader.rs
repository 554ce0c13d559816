//! Streaming reader for delimited text.
//!
//! A [`TsvReader`] parses one [`Record`] per line. On construction it skips a
//! fixed number of lines, then any leading comment lines, optionally consumes
//! a header, and peeks the first data row to validate the header width:
//!
//! - header width == row width: names are used as is;
//! - header width == row width - 1: a synthetic leading name (`ROWNAME` by
//!   default) is inserted for the un-named row-identifier column;
//! - anything else is a [`TsvError::Schema`].
//!
//! The decoded offset of the first data row is kept as a bookmark, and
//! [`TsvReader::rewind`] replays the data from there.
//!
//! # Blank lines
//!
//! A blank line ends the record sequence, exactly like end of file. Data after
//! a blank line is not reachable through `next_record` until `rewind`.
//!
//! ```no_run
//! use tsvflow::{ReaderOptions, TsvReader};
//! # fn main() -> tsvflow::Result<()> {
//! let mut reader = TsvReader::open("expr.tsv.gz", ReaderOptions::default())?;
//! println!("columns: {:?}", reader.names());
//! while let Some(row) = reader.next_record()? {
//!     println!("{}", row.field("ROWNAME")?);
//! }
//! reader.rewind()?;
//! let genes = reader.dump_column(0)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{IoContext, Result, TsvError, from_io_layer};
use crate::format::TsvFormat;
use crate::io::compression::{Decoded, open_decoded};
use crate::record::{FieldRef, Record, Schema};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds column names from the raw header line.
pub type HeaderParser = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Applied to every record before it is returned.
pub type RowTransform = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// How the first non-comment line is treated.
#[derive(Clone, Default)]
pub enum HeaderMode {
    /// No header; the first non-comment line is data.
    None,
    /// Split the first non-comment line by the delimiter.
    #[default]
    Infer,
    /// Hand the first non-comment line to a custom parser.
    Parse(HeaderParser),
}

impl fmt::Debug for HeaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderMode::None => f.write_str("None"),
            HeaderMode::Infer => f.write_str("Infer"),
            HeaderMode::Parse(_) => f.write_str("Parse(..)"),
        }
    }
}

/// Reader configuration.
#[derive(Clone)]
pub struct ReaderOptions {
    pub format: TsvFormat,
    pub header: HeaderMode,
    /// Attach the header names to every record.
    pub attach: bool,
    pub transform: Option<RowTransform>,
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("format", &self.format)
            .field("header", &self.header)
            .field("attach", &self.attach)
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            format: TsvFormat::default(),
            header: HeaderMode::Infer,
            attach: true,
            transform: None,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: TsvFormat) -> Self {
        self.format = format;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.format.delimiter = delimiter.into();
        self
    }

    pub fn comment(mut self, marker: impl Into<String>) -> Self {
        self.format.comment = Some(marker.into());
        self
    }

    pub fn no_comment(mut self) -> Self {
        self.format.comment = None;
        self
    }

    pub fn skip(mut self, lines: usize) -> Self {
        self.format.skip = lines;
        self
    }

    pub fn rowname(mut self, name: impl Into<String>) -> Self {
        self.format.rowname = name.into();
        self
    }

    pub fn header(mut self, mode: HeaderMode) -> Self {
        self.header = mode;
        self
    }

    pub fn no_header(self) -> Self {
        self.header(HeaderMode::None)
    }

    /// Use `parser` to turn the header line into names.
    pub fn parse_header<F>(self, parser: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.header(HeaderMode::Parse(Arc::new(parser)))
    }

    pub fn attach(mut self, attach: bool) -> Self {
        self.attach = attach;
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

enum Stream {
    /// Random access; rewinding seeks.
    Seekable(BufReader<Box<dyn ReadSeek>>),
    /// Decoding stream; rewinding reopens the path and skips the decoded prefix.
    Decoded(BufReader<Box<dyn Read>>),
}

/// Line-oriented view of a source that tracks its decoded byte offset.
struct LineSource {
    stream: Stream,
    path: Option<PathBuf>,
    offset: u64,
}

impl LineSource {
    /// Next line without its terminator, or `None` at end of stream.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = match &mut self.stream {
            Stream::Seekable(r) => r.read_line(&mut line)?,
            Stream::Decoded(r) => r.read_line(&mut line)?,
        };
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match &mut self.stream {
            Stream::Seekable(r) => {
                r.seek(SeekFrom::Start(offset))?;
            }
            Stream::Decoded(r) => {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| io::Error::other("decoded stream has no path to reopen"))?;
                let mut fresh: Box<dyn Read> = match open_decoded(path).map_err(io::Error::other)? {
                    Decoded::Plain(file) => Box::new(file),
                    Decoded::Codec { reader, .. } => reader,
                };
                let skipped = io::copy(&mut fresh.by_ref().take(offset), &mut io::sink())?;
                if skipped != offset {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("source shrank below bookmark at byte {offset}"),
                    ));
                }
                *r = BufReader::new(fresh);
            }
        }
        self.offset = offset;
        Ok(())
    }
}

/// Forward-only, rewindable stream of records from delimited text.
pub struct TsvReader {
    source: LineSource,
    label: String,
    format: TsvFormat,
    names: Vec<String>,
    schema: Option<Arc<Schema>>,
    transform: Option<RowTransform>,
    bookmark: u64,
    /// First data row, read while validating the header.
    pending: Option<String>,
    finished: bool,
}

impl TsvReader {
    /// Open `path`, decoding it transparently when compressed.
    ///
    /// # Errors
    /// I/O failures, codec setup failures and header/row width mismatches.
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let stream = match open_decoded(path).map_err(from_io_layer)? {
            Decoded::Plain(file) => Stream::Seekable(BufReader::new(Box::new(file))),
            Decoded::Codec { reader, .. } => Stream::Decoded(BufReader::new(reader)),
        };
        let source = LineSource {
            stream,
            path: Some(path.to_path_buf()),
            offset: 0,
        };
        Self::init(source, path.display().to_string(), options)
    }

    /// Read from an already-open seekable stream, e.g. an in-memory cursor.
    /// Parsing starts at the stream's current position.
    pub fn from_seekable<R>(mut reader: R, options: ReaderOptions) -> Result<Self>
    where
        R: Read + Seek + 'static,
    {
        let offset = reader
            .stream_position()
            .io_context(|| "locate <stream>")?;
        let source = LineSource {
            stream: Stream::Seekable(BufReader::new(Box::new(reader))),
            path: None,
            offset,
        };
        Self::init(source, "<stream>".to_string(), options)
    }

    fn init(mut source: LineSource, label: String, options: ReaderOptions) -> Result<Self> {
        let ReaderOptions {
            format,
            header,
            attach,
            transform,
        } = options;
        let read_err = |label: &str| format!("read {label}");

        for _ in 0..format.skip {
            if source.next_line().io_context(|| read_err(&label))?.is_none() {
                break;
            }
        }

        let mut start = source.offset;
        let mut first = source.next_line().io_context(|| read_err(&label))?;
        if let Some(marker) = format.comment_marker() {
            while first.as_deref().is_some_and(|l| l.starts_with(marker)) {
                start = source.offset;
                first = source.next_line().io_context(|| read_err(&label))?;
            }
        }

        let (mut names, bookmark, pending) = match &header {
            HeaderMode::None => (Vec::new(), start, first),
            HeaderMode::Infer | HeaderMode::Parse(_) => {
                let names = match (&header, first.as_deref()) {
                    (_, None) => Vec::new(),
                    (HeaderMode::Parse(parse), Some(line)) => parse(line),
                    (_, Some(line)) => {
                        let line = match format.comment_marker() {
                            Some(marker) => line
                                .strip_prefix(marker)
                                .map(str::trim_start)
                                .unwrap_or(line),
                            None => line,
                        };
                        format.split(line)
                    }
                };
                let bookmark = source.offset;
                let row = source.next_line().io_context(|| read_err(&label))?;
                (names, bookmark, row)
            }
        };

        if let Some(row) = pending.as_deref().filter(|r| !r.is_empty())
            && !names.is_empty()
        {
            let ncols = row.split(format.delimiter.as_str()).count();
            if names.len() + 1 == ncols {
                log::debug!("{label}: inserting '{}' for the row-name column", format.rowname);
                names.insert(0, format.rowname.clone());
            }
            if names.len() != ncols {
                return Err(TsvError::Schema {
                    source_name: label,
                    header: names.len(),
                    row: ncols,
                });
            }
        }

        let schema = if attach && !names.is_empty() {
            Some(Arc::new(Schema::new(names.clone())?))
        } else {
            None
        };
        log::debug!("{label}: {} columns, data starts at byte {bookmark}", names.len());

        Ok(Self {
            source,
            label,
            format,
            names,
            schema,
            transform,
            bookmark,
            pending,
            finished: false,
        })
    }

    /// Declared column names (empty when the source has no header).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn format(&self) -> &TsvFormat {
        &self.format
    }

    pub fn delimiter(&self) -> &str {
        &self.format.delimiter
    }

    /// Decoded byte offset of the first data row, counted from the start of
    /// the underlying stream.
    pub fn bookmark(&self) -> u64 {
        self.bookmark
    }

    pub fn path(&self) -> Option<&Path> {
        self.source.path.as_deref()
    }

    /// Next record, or `None` at end of file or at the first blank line.
    ///
    /// # Errors
    /// I/O failures, and [`TsvError::Names`] for a row whose width differs
    /// from the attached names.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.finished {
            return Ok(None);
        }
        let line = match self.pending.take() {
            Some(line) => Some(line),
            None => self
                .source
                .next_line()
                .io_context(|| format!("read {}", self.label))?,
        };
        let line = match line {
            Some(line) if !line.is_empty() => line,
            _ => {
                self.finished = true;
                return Ok(None);
            }
        };

        let values = self.format.split(&line);
        let record = match &self.schema {
            Some(schema) => Record::with_schema(values, Arc::clone(schema))?,
            None => Record::new(values),
        };
        Ok(Some(match &self.transform {
            Some(f) => f(record),
            None => record,
        }))
    }

    /// Restart from the first data row.
    pub fn rewind(&mut self) -> Result<()> {
        self.source
            .seek_to(self.bookmark)
            .io_context(|| format!("rewind {}", self.label))?;
        self.pending = None;
        self.finished = false;
        Ok(())
    }

    /// Materialize the remaining records.
    pub fn dump(&mut self) -> Result<Vec<Record>> {
        self.by_ref().collect()
    }

    /// Materialize one column of the remaining records.
    pub fn dump_column(&mut self, column: impl Into<FieldRef>) -> Result<Vec<String>> {
        let column = column.into();
        let mut out = Vec::new();
        while let Some(r) = self.next_record()? {
            out.push(r.resolve(&column)?.to_string());
        }
        Ok(out)
    }

    /// Materialize a tuple of columns per remaining record.
    pub fn dump_columns(&mut self, columns: &[FieldRef]) -> Result<Vec<Vec<String>>> {
        let mut out = Vec::new();
        while let Some(r) = self.next_record()? {
            let row = columns
                .iter()
                .map(|c| r.resolve(c).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            out.push(row);
        }
        Ok(out)
    }

    /// Release the underlying handle now rather than at drop.
    pub fn close(self) {}
}

impl Iterator for TsvReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl fmt::Debug for TsvReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsvReader")
            .field("source", &self.label)
            .field("names", &self.names)
            .field("bookmark", &self.bookmark)
            .finish()
    }
}
