//! Error isolation for merge joins.
//!
//! A join never stops on a single bad row by default. Every failure while
//! filling slots, matching or combining becomes a [`JoinDiagnostic`] that is
//! handed to a [`DiagnosticSink`], and the [`ErrorPolicy`] decides whether the
//! join carries on.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use tsvflow::diagnostics::DiagnosticCollector;
//! use tsvflow::{JoinEngine, ReaderOptions, TsvWriter, WriterOptions};
//! # fn main() -> tsvflow::Result<()> {
//! let collector = Arc::new(Mutex::new(DiagnosticCollector::new()));
//! let out = TsvWriter::create("joined.tsv", WriterOptions::default())?;
//! JoinEngine::open(&["a.tsv", "b.tsv"], ReaderOptions::default())?
//!     .with_diagnostics(Arc::clone(&collector))
//!     .join_with(out, |w, rows| {
//!         w.write_row(rows.iter().flat_map(|r| r.values().to_vec()))?;
//!         Ok(())
//!     })?;
//! let collector = collector.lock().unwrap();
//! collector.print_errors();
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// What a join does after reporting an iteration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Clear every slot and keep joining.
    #[default]
    Continue,
    /// Stop the join and return the error.
    Abort,
}

/// Step of the join loop that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStage {
    Fill,
    Match,
    Combine,
}

impl fmt::Display for JoinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinStage::Fill => "fill",
            JoinStage::Match => "match",
            JoinStage::Combine => "combine",
        })
    }
}

/// One recovered (or fatal) join iteration error, with the rows in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDiagnostic {
    /// Zero-based loop iteration.
    pub iteration: u64,
    pub stage: JoinStage,
    /// Error message including its context chain.
    pub message: String,
    /// Slot contents at the time of failure; `None` for an empty slot.
    pub rows: Vec<Option<Vec<String>>>,
}

impl JoinDiagnostic {
    /// Whether any in-flight row contains `value`.
    pub fn references(&self, value: &str) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|row| row.iter().any(|v| v == value))
    }
}

impl fmt::Display for JoinDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "join iteration {} failed at {}: {}",
            self.iteration, self.stage, self.message
        )?;
        write!(f, "With rows:")?;
        for row in &self.rows {
            match row {
                Some(values) => write!(f, "\n- {values:?}")?,
                None => write!(f, "\n- <empty>")?,
            }
        }
        Ok(())
    }
}

/// Receives join diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: JoinDiagnostic);
}

/// Default sink: logs every diagnostic at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: JoinDiagnostic) {
        log::warn!("{diagnostic}");
    }
}

/// Accumulates diagnostics for later inspection or export.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<JoinDiagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[JoinDiagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }

    /// Print all diagnostics to stderr.
    pub fn print_errors(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{diagnostic}\n");
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.diagnostics)
    }

    /// Write all diagnostics to `path` as a JSON array.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl DiagnosticSink for DiagnosticCollector {
    fn report(&mut self, diagnostic: JoinDiagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl DiagnosticSink for Arc<Mutex<DiagnosticCollector>> {
    fn report(&mut self, diagnostic: JoinDiagnostic) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .report(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Box<S> {
    fn report(&mut self, diagnostic: JoinDiagnostic) {
        (**self).report(diagnostic);
    }
}

impl fmt::Display for DiagnosticCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiagnosticCollector({} errors)", self.error_count())
    }
}
