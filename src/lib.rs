//! # tsvflow
//!
//! Streaming building blocks for delimited text tables, as produced and
//! consumed by bioinformatics tools: expression matrices, BED-like interval
//! lists, per-sample count tables.
//!
//! ## Key Features
//!
//! - **Records** with positional and named access ([`Record`])
//! - **Streaming reader** with comment skipping, header inference (including
//!   the un-named row-name column), rewind to the first data row, and
//!   transparent decompression ([`TsvReader`])
//! - **Writer** with header emission, column projection and append mode
//!   ([`TsvWriter`])
//! - **Merge join** over N sorted inputs with a pluggable match strategy and
//!   per-iteration error isolation ([`JoinEngine`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use tsvflow::*;
//!
//! # fn main() -> tsvflow::Result<()> {
//! // Normalize one table
//! let reader = TsvReader::open("counts.tsv.gz", ReaderOptions::default())?;
//! let mut out = TsvWriter::create("counts.norm.tsv", WriterOptions::default())?;
//! out.set_names(reader.names().to_vec());
//! out.write_header()?;
//! for row in reader {
//!     out.write_record(&row?)?;
//! }
//! out.close()?;
//!
//! // Join two sorted tables on their first column
//! let out = TsvWriter::create("joined.tsv", WriterOptions::default())?;
//! let summary = JoinEngine::open(&["a.tsv", "b.tsv"], ReaderOptions::default().no_header())?
//!     .join_with(out, |w, rows| {
//!         let (a, b) = (rows[0].values(), rows[1].values());
//!         w.write_row([a[0].as_str(), a[1].as_str(), b[1].as_str()])?;
//!         Ok(())
//!     })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`record`] - `Record`, `FieldKey`, `FieldRef`
//! - [`reader`] - `TsvReader` and its options
//! - [`writer`] - `TsvWriter` and its options
//! - [`join`] - `JoinEngine`, match strategies and combine callbacks
//! - [`diagnostics`] - join error sinks and policies
//! - [`format`] - serializable text format configuration
//! - [`io`] - compression codecs and glob expansion
//! - [`testing`] - fixtures for tests

pub mod diagnostics;
pub mod error;
pub mod format;
pub mod io;
pub mod join;
pub mod reader;
pub mod record;
pub mod testing;
pub mod writer;

pub use diagnostics::{DiagnosticCollector, DiagnosticSink, ErrorPolicy, JoinDiagnostic, JoinStage, LogSink};
pub use error::{Result, TsvError};
pub use format::TsvFormat;
pub use join::{Combine, JoinEngine, JoinOptions, JoinSummary, KeyMatch, MatchAdvance, MatchFn, MatchResult, compare_keys};
pub use reader::{HeaderMode, ReaderOptions, TsvReader};
pub use record::{FieldKey, FieldRef, Record};
pub use writer::{TsvWriter, WriterOptions};
