//! Ordered, optionally-named tuples of field values.
//!
//! A [`Record`] always supports positional access. Once a name schema is
//! attached, fields can also be resolved by name. Records produced by one
//! reader share a single schema allocation; a record that later declares a new
//! field gets its own copy.
//!
//! ```
//! use tsvflow::Record;
//!
//! let mut r = Record::from(vec!["chr1", "100", "200"]);
//! r.attach_names(["chrom", "start", "end"])?;
//! assert_eq!(r.field("start")?, "100");
//! assert_eq!(r.get(2), Some("200"));
//!
//! r.set_field("name", "peak1");
//! assert_eq!(r.len(), 4);
//! # Ok::<(), tsvflow::TsvError>(())
//! ```

use crate::error::{Result, TsvError};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name to position mapping, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Schema {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn new(names: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            if index.insert(name.clone(), pos).is_some() {
                return Err(TsvError::Names(format!("duplicate name '{name}'")));
            }
        }
        Ok(Self { names, index })
    }

    /// Names `"0"`, `"1"`, ... for `n` unnamed fields.
    fn positional(n: usize) -> Self {
        let names: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let index = names.iter().cloned().zip(0..n).collect();
        Self { names, index }
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn push(&mut self, name: String) {
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
    }

    fn remove(&mut self, pos: usize) {
        let name = self.names.remove(pos);
        self.index.remove(&name);
        for (i, n) in self.names.iter().enumerate().skip(pos) {
            self.index.insert(n.clone(), i);
        }
    }
}

/// Key of a field as reported by [`Record::names`] and [`Record::items`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey<'a> {
    /// Implicit position of a field in an unnamed record.
    Index(usize),
    /// Declared name of a field.
    Name(&'a str),
}

impl fmt::Display for FieldKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Index(i) => write!(f, "{i}"),
            FieldKey::Name(n) => f.write_str(n),
        }
    }
}

/// An owned column selector, used where either a position or a name will do
/// (column projections, join keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Index(usize),
    Name(String),
}

impl From<usize> for FieldRef {
    fn from(i: usize) -> Self {
        FieldRef::Index(i)
    }
}

impl From<&str> for FieldRef {
    fn from(s: &str) -> Self {
        FieldRef::Name(s.to_string())
    }
}

impl From<String> for FieldRef {
    fn from(s: String) -> Self {
        FieldRef::Name(s)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Index(i) => write!(f, "#{i}"),
            FieldRef::Name(n) => f.write_str(n),
        }
    }
}

/// One row of delimited text.
#[derive(Debug, Clone, Default)]
pub struct Record {
    values: Vec<String>,
    schema: Option<Arc<Schema>>,
}

impl Record {
    /// An unnamed record holding `values`.
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            schema: None,
        }
    }

    /// A record with names attached up front.
    ///
    /// # Errors
    /// Fails when the name count differs from the value count or names repeat.
    pub fn with_names<I, S>(values: Vec<String>, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut r = Self::new(values);
        r.attach_names(names)?;
        Ok(r)
    }

    pub(crate) fn with_schema(values: Vec<String>, schema: Arc<Schema>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(TsvError::Names(format!(
                "{} names for {} values",
                schema.len(),
                values.len()
            )));
        }
        Ok(Self {
            values,
            schema: Some(schema),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether a name schema is attached.
    pub fn is_named(&self) -> bool {
        self.schema.is_some()
    }

    /// Attach a name schema. Allowed once per record.
    ///
    /// # Errors
    /// [`TsvError::Names`] if names are already attached, the lengths differ or
    /// a name repeats.
    pub fn attach_names<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.schema.is_some() {
            return Err(TsvError::Names("names already attached".into()));
        }
        let schema = Schema::new(names.into_iter().map(Into::into).collect())?;
        if schema.len() != self.values.len() {
            return Err(TsvError::Names(format!(
                "{} names for {} values",
                schema.len(),
                self.values.len()
            )));
        }
        self.schema = Some(Arc::new(schema));
        Ok(())
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Value of the field declared as `name`.
    ///
    /// # Errors
    /// [`TsvError::Lookup`] if the record is unnamed or lacks `name`.
    pub fn field(&self, name: &str) -> Result<&str> {
        self.position(name)
            .map(|pos| self.values[pos].as_str())
            .ok_or_else(|| TsvError::Lookup(name.to_string()))
    }

    /// Value of `name`, or `default` when the lookup fails.
    pub fn field_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.field(name).unwrap_or(default)
    }

    /// Resolve a selector to a value.
    ///
    /// # Errors
    /// [`TsvError::Index`] for an out-of-range position, [`TsvError::Lookup`]
    /// for an unknown name.
    pub fn resolve(&self, field: &FieldRef) -> Result<&str> {
        match field {
            FieldRef::Index(i) => self.get(*i).ok_or(TsvError::Index {
                index: *i,
                len: self.values.len(),
            }),
            FieldRef::Name(n) => self.field(n),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Overwrite the value at `index`; the record never grows through this.
    ///
    /// # Errors
    /// [`TsvError::Index`] when `index >= len()`.
    pub fn set(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(TsvError::Index { index, len })?;
        *slot = value.into();
        Ok(())
    }

    /// Overwrite a declared field, or append `value` under the new `name`.
    ///
    /// An unnamed record first names its existing fields after their
    /// positions (`"0"`, `"1"`, ...), so `set_field("1", v)` on it overwrites
    /// position 1.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        if let Some(pos) = self.position(name) {
            self.values[pos] = value.into();
            return;
        }
        let len = self.values.len();
        let schema = Arc::make_mut(
            self.schema
                .get_or_insert_with(|| Arc::new(Schema::positional(len))),
        );
        match schema.position(name) {
            Some(pos) => self.values[pos] = value.into(),
            None => {
                schema.push(name.to_string());
                self.values.push(value.into());
            }
        }
    }

    /// Remove and return the value at `index`, renumbering later names.
    pub fn remove(&mut self, index: usize) -> Result<String> {
        if index >= self.values.len() {
            return Err(TsvError::Index {
                index,
                len: self.values.len(),
            });
        }
        if let Some(schema) = self.schema.as_mut() {
            Arc::make_mut(schema).remove(index);
        }
        Ok(self.values.remove(index))
    }

    /// Remove and return the field declared as `name`.
    pub fn remove_field(&mut self, name: &str) -> Result<String> {
        let pos = self
            .position(name)
            .ok_or_else(|| TsvError::Lookup(name.to_string()))?;
        self.remove(pos)
    }

    /// Declared names in position order, or implicit positions when unnamed.
    pub fn names(&self) -> Vec<FieldKey<'_>> {
        match &self.schema {
            Some(s) => s.names().iter().map(|n| FieldKey::Name(n)).collect(),
            None => (0..self.values.len()).map(FieldKey::Index).collect(),
        }
    }

    /// `(key, value)` pairs in position order.
    pub fn items(&self) -> impl Iterator<Item = (FieldKey<'_>, &str)> + '_ {
        let names = self.schema.as_deref().map(Schema::names);
        self.values.iter().enumerate().map(move |(i, v)| {
            let key = match names {
                Some(n) => FieldKey::Name(&n[i]),
                None => FieldKey::Index(i),
            };
            (key, v.as_str())
        })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    /// Owned `(name, value)` pairs in position order; unnamed fields are keyed
    /// by their position.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.items()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.schema.as_ref().and_then(|s| s.position(name))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.names() == other.names()
    }
}

impl Eq for Record {}

impl From<Vec<String>> for Record {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl From<Vec<&str>> for Record {
    fn from(values: Vec<&str>) -> Self {
        Self::new(values.into_iter().map(str::to_string).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.schema {
            Some(schema) => {
                let mut map = serializer.serialize_map(Some(self.values.len()))?;
                for (name, value) in schema.names().iter().zip(&self.values) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            None => {
                let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
                for value in &self.values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Record: {{")?;
        for (i, (k, v)) in self.items().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", k.to_string(), v)?;
        }
        write!(f, "}}>")
    }
}
