//! In-memory tables: ordered columns, positional rows, typed cells.
//!
//! Tables are snapshots. Transform functions in this crate borrow a table and
//! return a new one; the only mutating API is [`Table::push_row`], used while
//! a table is being built.

use std::collections::HashSet;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the cell. Text is accepted when it parses as a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write_number(f, *n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

/// Fold a column name or key text: trim, collapse inner whitespace, uppercase.
pub fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

// ---------------------------------------------------------------------------
// Key cells
// ---------------------------------------------------------------------------

/// A hashable, typed key cell. Numbers compare numerically, text compares
/// after [`fold`]. A number never equals a text value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Number(OrderedFloat<f64>),
    Text(String),
}

impl KeyValue {
    /// `None` for null, blank text, and non-finite numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) if !n.is_finite() => None,
            // -0.0 and 0.0 must hash identically
            Value::Number(n) if *n == 0.0 => Some(Self::Number(OrderedFloat(0.0))),
            Value::Number(n) => Some(Self::Number(OrderedFloat(*n))),
            Value::Text(s) => {
                let folded = fold(s);
                if folded.is_empty() {
                    None
                } else {
                    Some(Self::Text(folded))
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::Number(n.into_inner()),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_f64(n.into_inner()),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write_number(f, n.into_inner()),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table. Column names must be unique.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self, ReconError> {
        let name = name.into();
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.as_str()) {
                return Err(ReconError::DuplicateColumn {
                    table: name,
                    canonical: col.clone(),
                    sources: vec![col.clone(), col.clone()],
                });
            }
        }
        Ok(Self { name, columns, rows: Vec::new() })
    }

    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ReconError> {
        let mut table = Self::new(name, columns)?;
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ReconError> {
        if row.len() != self.columns.len() {
            return Err(ReconError::RowWidth {
                table: self.name.clone(),
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Exact (already-normalized) column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Resolve several columns at once, reporting every missing one.
    pub fn require_columns(&self, names: &[String]) -> Result<Vec<usize>, ReconError> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(i) => indices.push(i),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(ReconError::MissingKeyColumns { table: self.name.clone(), columns: missing })
        }
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Copy of this table under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }

    /// Rows as JSON objects keyed by column name, for record-oriented consumers.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| {
                        let json = match val {
                            Value::Null => serde_json::Value::Null,
                            Value::Text(s) => serde_json::Value::String(s.clone()),
                            Value::Number(n) => serde_json::Number::from_f64(*n)
                                .map(serde_json::Value::Number)
                                .unwrap_or(serde_json::Value::Null),
                        };
                        (col.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
