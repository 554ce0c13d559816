//! Fixtures for tests that read and write delimited files.
//!
//! [`TsvFixture`] owns a temporary directory that is removed on drop. Files
//! are written and read through the same codec layer as readers and writers,
//! so a fixture named `*.gz` is really gzip-compressed.
//!
//! ```
//! use tsvflow::testing::TsvFixture;
//! use tsvflow::{ReaderOptions, TsvReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let fx = TsvFixture::new()?;
//! let path = fx.write("expr.tsv.gz", "A\tB\ng1\t1\t2\n")?;
//! let reader = TsvReader::open(&path, ReaderOptions::default())?;
//! assert_eq!(reader.names(), ["ROWNAME", "A", "B"]);
//! assert_eq!(fx.read(&path)?, "A\tB\ng1\t1\t2\n");
//! # Ok(())
//! # }
//! ```

use crate::io::compression::{Decoded, EncodedWrite, create_encoded, open_decoded};
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` to `path`, compressing by suffix.
pub fn write_text(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    let mut out = create_encoded(path, false)?;
    out.write_all(content.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    out.finish()
        .with_context(|| format!("finish {}", path.display()))
}

/// Read `path` to a string, decompressing by suffix or magic bytes.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut reader: Box<dyn Read> = match open_decoded(path)? {
        Decoded::Plain(file) => Box::new(file),
        Decoded::Codec { reader, .. } => reader,
    };
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(text)
}

/// Scratch directory for delimited test files.
pub struct TsvFixture {
    dir: TempDir,
}

impl TsvFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create fixture directory")?,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the fixture; nothing is created.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `content` to `name` and return its path.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(name);
        write_text(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        read_text(path)
    }
}

/// Expression matrix whose header lacks the gene column name.
#[must_use]
pub fn sample_expression_table() -> &'static str {
    "# generated by featureCounts\n\
     # columns: samples\n\
     S1\tS2\tS3\n\
     BRCA1\t10\t12\t9\n\
     TP53\t3\t0\t7\n\
     EGFR\t25\t30\t28\n"
}

/// Two inputs sorted on their first column, sharing keys 1 and 3.
#[must_use]
pub fn sample_join_inputs() -> (&'static str, &'static str) {
    ("1\ta\n3\tc\n", "1\tx\n2\ty\n3\tz\n")
}
