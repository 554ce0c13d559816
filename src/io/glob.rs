//! Resolve join inputs from glob patterns.
//!
//! Matches are restricted to regular files and sorted lexicographically, so
//! the reader order of a join built from a pattern is deterministic
//! (`sample_01.tsv` before `sample_02.tsv`).
//!
//! ```no_run
//! use tsvflow::io::glob::expand_glob_required;
//!
//! let inputs = expand_glob_required("counts/sample_*.tsv.gz")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// Sorted regular files matching `pattern`; an empty list is not an error.
///
/// # Errors
/// Fails on an invalid pattern or an unreadable directory entry.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("read glob entry for {pattern}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Like [`expand_glob`], but zero matches is an error.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}
