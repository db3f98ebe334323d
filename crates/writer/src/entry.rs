//! Metric entries
//!
//! An [`Entry`] is a timestamp plus a set of named, typed fields. Entries are
//! built by the producer with chained setters and handed to the writer's
//! input queue, after which they are never mutated.
//!
//! Fields are kept in a `BTreeMap`, so rendering is independent of the order
//! in which fields were set: two entries with the same field names always
//! produce byte-identical SQL text.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use chrono::{DateTime, FixedOffset};

use crate::executor::{Argument, Statement};

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:.3}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// A single time-stamped metric record
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    ts: DateTime<FixedOffset>,
    fields: BTreeMap<String, Value>,
}

impl Entry {
    /// Create an empty entry; use [`TableWriter::new_entry`](crate::TableWriter::new_entry)
    /// to bind the writer's offset.
    pub(crate) fn new(ts: DateTime<FixedOffset>) -> Self {
        Self {
            ts,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field of any supported type. Last write wins.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if name.is_empty() {
            tracing::debug!("ignoring field with empty name");
            return self;
        }
        self.fields.insert(name, value.into());
        self
    }

    /// Set a text field
    pub fn str(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, Value::Text(value.into()))
    }

    /// Set an integer field
    pub fn int(self, name: impl Into<String>, value: i64) -> Self {
        self.set(name, Value::Integer(value))
    }

    /// Set a floating-point field
    pub fn float(self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, Value::Float(value))
    }

    /// Set a boolean field
    pub fn bool(self, name: impl Into<String>, value: bool) -> Self {
        self.set(name, Value::Boolean(value))
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.ts
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields (the timestamp is not counted)
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in render order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Render a parameterized INSERT for `table`.
    ///
    /// The timestamp is always `$1` under `ts_column`; fields follow in
    /// ascending byte order of their names.
    pub fn render(&self, table: &str, ts_column: &str) -> Statement {
        let mut columns = String::with_capacity(ts_column.len() + self.fields.len() * 16);
        let mut placeholders = String::with_capacity(4 + self.fields.len() * 5);
        let mut args = Vec::with_capacity(self.fields.len() + 1);

        columns.push_str(ts_column);
        placeholders.push_str("$1");
        args.push(Argument::Timestamp(self.ts));

        for (i, (name, value)) in self.fields.iter().enumerate() {
            columns.push_str(", ");
            columns.push_str(name);
            // Writing to a String cannot fail
            let _ = write!(placeholders, ", ${}", i + 2);
            args.push(Argument::Value(value.clone()));
        }

        Statement {
            sql: format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
            args,
        }
    }

    /// Human-readable rendering for logs
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry{{ts: {}", self.ts.format("%Y-%m-%d %H:%M:%S %:z"))?;
        for (name, value) in &self.fields {
            write!(f, ", {name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod entry_test;
