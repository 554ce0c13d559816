//! Text format configuration shared by readers, writers and joins.
//!
//! [`TsvFormat`] holds the plain, serializable part of the configuration and
//! can be loaded from JSON:
//!
//! ```
//! use tsvflow::TsvFormat;
//!
//! let fmt = TsvFormat::from_json_str(r#"{ "delimiter": ",", "skip": 2 }"#)?;
//! assert_eq!(fmt.delimiter, ",");
//! assert_eq!(fmt.comment.as_deref(), Some("#"));
//! assert_eq!(fmt.rowname, "ROWNAME");
//! # Ok::<(), tsvflow::TsvError>(())
//! ```

use crate::error::{IoContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: &str = "\t";
/// Default leading-comment marker.
pub const DEFAULT_COMMENT: &str = "#";
/// Default synthetic name for an un-named leading row-identifier column.
pub const DEFAULT_ROWNAME: &str = "ROWNAME";

/// Delimited text layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsvFormat {
    /// Field delimiter; may be longer than one character.
    pub delimiter: String,
    /// Marker for leading comment lines. `None` (or empty) disables comment skipping.
    pub comment: Option<String>,
    /// Lines skipped unconditionally before anything else is parsed.
    pub skip: usize,
    /// Name inserted when the header is one column short of the first data row.
    pub rowname: String,
}

impl Default for TsvFormat {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            comment: Some(DEFAULT_COMMENT.to_string()),
            skip: 0,
            rowname: DEFAULT_ROWNAME.to_string(),
        }
    }
}

impl TsvFormat {
    /// Comma-separated layout, otherwise default.
    pub fn csv() -> Self {
        Self {
            delimiter: ",".to_string(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .io_context(|| format!("read format config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// The comment marker, if comment skipping is enabled.
    pub(crate) fn comment_marker(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.is_empty())
    }

    pub(crate) fn split(&self, line: &str) -> Vec<String> {
        line.split(self.delimiter.as_str())
            .map(str::to_string)
            .collect()
    }
}
