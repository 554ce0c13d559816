//! Synchronized merge join over N sorted readers.
//!
//! The engine keeps one slot per reader. Each iteration fills every empty slot
//! from its reader, asks the [`MatchFn`] whether the current rows agree, and
//! then either hands all rows to the [`Combine`] callback (a full match) or
//! drops the lagging row so its reader can catch up. The join ends as soon as
//! a reader that has to fill a slot runs dry, so it is a strict (inner) join:
//! trailing rows of the other readers are never visited.
//!
//! Failures inside an iteration are isolated: the rows in flight are reported
//! to the [`DiagnosticSink`], every slot is cleared and the loop resumes,
//! unless the [`ErrorPolicy`] says to abort.
//!
//! ## Example
//! ```no_run
//! use tsvflow::{JoinEngine, JoinOptions, KeyMatch, ReaderOptions, TsvWriter, WriterOptions};
//! # fn main() -> tsvflow::Result<()> {
//! let out = TsvWriter::create("merged.tsv", WriterOptions::default())?;
//! let summary = JoinEngine::open(&["left.tsv", "right.tsv"], ReaderOptions::default())?
//!     .with_match(KeyMatch::on("gene"))
//!     .with_options(JoinOptions::default().header(true))
//!     .join_with(out, |w, rows| {
//!         w.write_row(rows.iter().flat_map(|r| r.values().iter()))?;
//!         Ok(())
//!     })?;
//! println!("{} matched rows", summary.matched);
//! # Ok(())
//! # }
//! ```
//!
//! ## Advancing after a full match
//! With [`MatchAdvance::All`] (the default) every slot moves on after the
//! callback ran. [`MatchAdvance::FirstOnly`] only refills slot 0 and keeps the
//! other rows, so reader 0 may hold several rows per key of the others. Older
//! outputs of this join were produced with that behavior.

use crate::diagnostics::{DiagnosticSink, ErrorPolicy, JoinDiagnostic, JoinStage, LogSink};
use crate::error::{Result, TsvError};
use crate::io::glob::expand_glob_required;
use crate::reader::{ReaderOptions, TsvReader};
use crate::record::{FieldRef, Record};
use crate::writer::TsvWriter;
use anyhow::anyhow;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Ordering;
use std::iter;
use std::path::Path;

/// Verdict of a [`MatchFn`] over the current rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Every row carries the same key.
    AllEqual,
    /// The row in this slot lags behind and is dropped.
    Advance(usize),
}

/// Decides whether the current rows (one per reader) match.
pub trait MatchFn {
    fn evaluate(&mut self, rows: &[Record]) -> anyhow::Result<MatchResult>;
}

impl<F> MatchFn for F
where
    F: FnMut(&[Record]) -> anyhow::Result<MatchResult>,
{
    fn evaluate(&mut self, rows: &[Record]) -> anyhow::Result<MatchResult> {
        self(rows)
    }
}

/// Consumes a full match, usually by writing to the output.
pub trait Combine {
    fn combine(&mut self, out: &mut TsvWriter, rows: &[Record]) -> anyhow::Result<()>;
}

impl<F> Combine for F
where
    F: FnMut(&mut TsvWriter, &[Record]) -> anyhow::Result<()>,
{
    fn combine(&mut self, out: &mut TsvWriter, rows: &[Record]) -> anyhow::Result<()> {
        self(out, rows)
    }
}

/// Compare two keys as strings, byte by byte.
pub fn compare_keys(a: &str, b: &str, descending: bool) -> Ordering {
    let ord = a.cmp(b);
    if descending { ord.reverse() } else { ord }
}

fn parse_number(s: &str) -> Option<OrderedFloat<f64>> {
    s.trim().parse::<f64>().ok().map(OrderedFloat)
}

/// Key-column match for inputs sorted on that column.
///
/// Keys compare as strings by default, the order `sort -k1,1` produces. With
/// [`KeyMatch::numeric`] every key is parsed as a number for the whole join,
/// and a key that does not parse is a match error. The first slot holding the
/// smallest key (largest, for [`KeyMatch::descending`]) lags; if every slot
/// holds it, the rows match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatch {
    column: FieldRef,
    descending: bool,
    numeric: bool,
}

impl KeyMatch {
    /// Match on field 0.
    pub fn first_column() -> Self {
        Self::on(0)
    }

    pub fn on(column: impl Into<FieldRef>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            numeric: false,
        }
    }

    /// For inputs sorted in descending key order.
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// For inputs sorted numerically on the key (`sort -k1,1n`).
    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }
}

impl Default for KeyMatch {
    fn default() -> Self {
        Self::first_column()
    }
}

impl MatchFn for KeyMatch {
    fn evaluate(&mut self, rows: &[Record]) -> anyhow::Result<MatchResult> {
        let keys = rows
            .iter()
            .map(|r| r.resolve(&self.column))
            .collect::<Result<Vec<_>>>()?;
        if !self.numeric {
            return Ok(laggard(&keys, self.descending));
        }
        let nums = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                parse_number(k).ok_or_else(|| anyhow!("key '{k}' of reader {i} is not a number"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(laggard(&nums, self.descending))
    }
}

fn laggard<T: Ord>(keys: &[T], descending: bool) -> MatchResult {
    let mut lag = 0;
    for (i, key) in keys.iter().enumerate().skip(1) {
        let behind = if descending {
            *key > keys[lag]
        } else {
            *key < keys[lag]
        };
        if behind {
            lag = i;
        }
    }
    if keys.iter().all(|k| *k == keys[lag]) {
        MatchResult::AllEqual
    } else {
        MatchResult::Advance(lag)
    }
}

/// Which slots are refilled after a full match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchAdvance {
    /// Every reader moves on.
    #[default]
    All,
    /// Only reader 0 moves on; the other rows are compared again.
    FirstOnly,
}

/// Join configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinOptions {
    pub policy: ErrorPolicy,
    pub advance: MatchAdvance,
    /// Write the concatenated reader names as the output header.
    pub header: bool,
    /// Abort once more than this many iteration errors were recovered.
    pub max_errors: Option<usize>,
}

impl JoinOptions {
    pub fn policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn advance(mut self, advance: MatchAdvance) -> Self {
        self.advance = advance;
        self
    }

    pub fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn max_errors(mut self, max: usize) -> Self {
        self.max_errors = Some(max);
        self
    }
}

/// Counters reported when a join finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JoinSummary {
    /// Loop passes that did not end in exhaustion.
    pub iterations: u64,
    /// Combine callbacks that succeeded.
    pub matched: u64,
    /// Lagging rows dropped without a callback.
    pub discarded: u64,
    /// Iteration errors reported to the sink.
    pub errors: u64,
}

enum Step {
    Matched,
    Discarded,
    Exhausted,
}

struct StepError {
    stage: JoinStage,
    error: anyhow::Error,
    rows: Vec<Option<Vec<String>>>,
}

/// N-way merge join session. Consumed by [`JoinEngine::join`].
pub struct JoinEngine {
    readers: Vec<TsvReader>,
    matcher: Box<dyn MatchFn>,
    sink: Box<dyn DiagnosticSink>,
    options: JoinOptions,
}

impl JoinEngine {
    /// Join over `readers`, in order, with [`KeyMatch::first_column`].
    ///
    /// # Errors
    /// [`TsvError::Join`] when `readers` is empty.
    pub fn new(readers: Vec<TsvReader>) -> Result<Self> {
        if readers.is_empty() {
            return Err(TsvError::Join("a join needs at least one reader".into()));
        }
        Ok(Self {
            readers,
            matcher: Box::new(KeyMatch::first_column()),
            sink: Box::new(LogSink),
            options: JoinOptions::default(),
        })
    }

    /// Open every path with the same reader options.
    pub fn open<P: AsRef<Path>>(paths: &[P], options: ReaderOptions) -> Result<Self> {
        let readers = paths
            .iter()
            .map(|p| TsvReader::open(p, options.clone()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(readers)
    }

    /// Open each path with its own options; missing entries use the defaults.
    pub fn open_each<P: AsRef<Path>>(paths: &[P], options: Vec<ReaderOptions>) -> Result<Self> {
        let readers = paths
            .iter()
            .zip(options.into_iter().chain(iter::repeat_with(ReaderOptions::default)))
            .map(|(p, opts)| TsvReader::open(p, opts))
            .collect::<Result<Vec<_>>>()?;
        Self::new(readers)
    }

    /// Open every file matching `pattern`, in sorted path order.
    pub fn open_glob(pattern: &str, options: ReaderOptions) -> Result<Self> {
        let paths = expand_glob_required(pattern).map_err(|e| TsvError::Join(format!("{e:#}")))?;
        Self::open(&paths, options)
    }

    pub fn with_match<M: MatchFn + 'static>(mut self, matcher: M) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Like [`JoinEngine::with_match`], for closures.
    pub fn with_match_fn<F>(self, f: F) -> Self
    where
        F: FnMut(&[Record]) -> anyhow::Result<MatchResult> + 'static,
    {
        self.with_match(f)
    }

    pub fn with_diagnostics<S: DiagnosticSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_options(mut self, options: JoinOptions) -> Self {
        self.options = options;
        self
    }

    pub fn readers(&self) -> &[TsvReader] {
        &self.readers
    }

    /// Names of all readers, concatenated in reader order.
    pub fn names(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.names().iter().cloned())
            .collect()
    }

    /// Run the join, writing through `out`, which is closed afterwards.
    ///
    /// # Errors
    /// Output I/O failures (header, close), and iteration errors when the
    /// policy is [`ErrorPolicy::Abort`] or `max_errors` is exceeded.
    pub fn join<C: Combine>(self, mut out: TsvWriter, mut combine: C) -> Result<JoinSummary> {
        let names = self.names();
        let JoinEngine {
            mut readers,
            mut matcher,
            mut sink,
            options,
        } = self;

        if options.header && !names.is_empty() {
            out.write_names(&names)?;
        }

        let mut slots: Vec<Option<Record>> = iter::repeat_with(|| None).take(readers.len()).collect();
        let mut summary = JoinSummary::default();
        loop {
            let iteration = summary.iterations;
            let outcome = step(
                &mut readers,
                &mut slots,
                matcher.as_mut(),
                &mut combine,
                &mut out,
                options.advance,
            );
            match outcome {
                Ok(Step::Exhausted) => break,
                Ok(Step::Matched) => summary.matched += 1,
                Ok(Step::Discarded) => summary.discarded += 1,
                Err(StepError { stage, error, rows }) => {
                    summary.errors += 1;
                    let message = format!("{error:#}");
                    sink.report(JoinDiagnostic {
                        iteration,
                        stage,
                        message: message.clone(),
                        rows,
                    });
                    slots.iter_mut().for_each(|s| *s = None);

                    let too_many = options
                        .max_errors
                        .is_some_and(|max| summary.errors > max as u64);
                    if options.policy == ErrorPolicy::Abort || too_many {
                        out.close()?;
                        return Err(TsvError::Join(format!(
                            "aborted at iteration {iteration} ({stage}): {message}"
                        )));
                    }
                }
            }
            summary.iterations += 1;
        }

        out.close()?;
        log::info!(
            "join finished after {} iterations: {} matched, {} discarded, {} errors",
            summary.iterations,
            summary.matched,
            summary.discarded,
            summary.errors
        );
        Ok(summary)
    }
}

impl JoinEngine {
    /// Like [`JoinEngine::join`], for closures.
    pub fn join_with<F>(self, out: TsvWriter, combine: F) -> Result<JoinSummary>
    where
        F: FnMut(&mut TsvWriter, &[Record]) -> anyhow::Result<()>,
    {
        self.join(out, combine)
    }
}

fn snapshot(slots: &[Option<Record>]) -> Vec<Option<Vec<String>>> {
    slots
        .iter()
        .map(|s| s.as_ref().map(|r| r.values().to_vec()))
        .collect()
}

/// One pass of the join loop.
fn step<C: Combine>(
    readers: &mut [TsvReader],
    slots: &mut [Option<Record>],
    matcher: &mut dyn MatchFn,
    combine: &mut C,
    out: &mut TsvWriter,
    advance: MatchAdvance,
) -> std::result::Result<Step, StepError> {
    for i in 0..slots.len() {
        if slots[i].is_some() {
            continue;
        }
        match readers[i].next_record() {
            Ok(Some(record)) => slots[i] = Some(record),
            Ok(None) => return Ok(Step::Exhausted),
            Err(e) => {
                return Err(StepError {
                    stage: JoinStage::Fill,
                    error: anyhow::Error::new(e).context(format!("reader {i}")),
                    rows: snapshot(slots),
                });
            }
        }
    }

    // every slot is filled here
    let rows: Vec<Record> = slots.iter_mut().filter_map(Option::take).collect();
    let fail = |stage, error, rows: &[Record]| StepError {
        stage,
        error,
        rows: rows.iter().map(|r| Some(r.values().to_vec())).collect(),
    };

    let verdict = match matcher.evaluate(&rows) {
        Ok(MatchResult::Advance(i)) if i >= rows.len() => {
            let error = anyhow!("match function chose slot {i} of {}", rows.len());
            return Err(fail(JoinStage::Match, error, &rows));
        }
        Ok(verdict) => verdict,
        Err(error) => return Err(fail(JoinStage::Match, error, &rows)),
    };

    match verdict {
        MatchResult::AllEqual => {
            if let Err(error) = combine.combine(out, &rows) {
                return Err(fail(JoinStage::Combine, error, &rows));
            }
            if advance == MatchAdvance::FirstOnly {
                for (slot, row) in slots.iter_mut().zip(rows).skip(1) {
                    *slot = Some(row);
                }
            }
            Ok(Step::Matched)
        }
        MatchResult::Advance(lag) => {
            for (i, (slot, row)) in slots.iter_mut().zip(rows).enumerate() {
                if i != lag {
                    *slot = Some(row);
                }
            }
            Ok(Step::Discarded)
        }
    }
}
