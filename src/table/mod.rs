//! Ordered-column tabular container
//!
//! `Table` stores data column-major with insertion-ordered column names, so
//! schema inspection and CSV round-trips see columns in their original
//! order. Cells are `Value`s: numeric, text, or missing.

mod csv;

pub use csv::{read_csv, read_csv_reader, write_csv, write_csv_writer};

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::error::{Error, Result};

/// A single cell in a table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric cell (integers are stored as their float value)
    Float(f64),
    /// Free-form text cell
    Text(String),
    /// Absent or unparseable-as-anything cell
    Missing,
}

impl Value {
    /// Parse a raw CSV field into a value
    ///
    /// Empty strings and common null markers become `Missing`; anything that
    /// parses as a float becomes `Float`; the rest stays `Text`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        let lower = trimmed.to_lowercase();
        if matches!(lower.as_str(), "na" | "n/a" | "nan" | "null" | "none") {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Float(v),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    /// Numeric view of the cell, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the cell, if it has one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for `Missing`
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Canonical string form used as a category key and in CSV output
    pub fn to_field(&self) -> String {
        match self {
            Value::Float(v) => format!("{v}"),
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// A single input record: column name to value
pub type Record = BTreeMap<String, Value>;

/// Column-major table with insertion-ordered columns
#[derive(Debug, Clone, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    /// True when the table has no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.n_cols() == 0
    }

    /// Column names in original order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// True when a column with this exact name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Values of a column, if present
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Append a column; length must match existing rows unless the table is
    /// column-less
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::InvalidParameter(format!(
                "duplicate column '{name}'"
            )));
        }
        if !self.names.is_empty() && values.len() != self.n_rows() {
            return Err(Error::InvalidParameter(format!(
                "column '{name}' has {} rows, table has {}",
                values.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Replace the values of an existing column
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        if values.len() != self.n_rows() {
            return Err(Error::InvalidParameter(format!(
                "column '{name}' has {} rows, table has {}",
                values.len(),
                self.n_rows()
            )));
        }
        self.columns[idx] = values;
        Ok(())
    }

    /// One row as (name, value) pairs in column order
    pub fn row(&self, idx: usize) -> Vec<(&str, &Value)> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, col)| (n.as_str(), &col[idx]))
            .collect()
    }

    /// One row as an owned record
    pub fn record(&self, idx: usize) -> Record {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, col)| (n.clone(), col[idx].clone()))
            .collect()
    }

    /// Build a table from records; columns are the union of keys in
    /// first-seen order, absent keys become `Missing`
    pub fn from_records(records: &[Record]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for rec in records {
            for key in rec.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .iter()
            .map(|name| {
                records
                    .iter()
                    .map(|rec| rec.get(name).cloned().unwrap_or(Value::Missing))
                    .collect()
            })
            .collect();
        Self { names, columns }
    }

    /// Dense matrix over the named columns; a referenced column must exist
    ///
    /// Cells without a numeric view become 0.0. Categorical columns are
    /// expected to be encoded before this point.
    pub fn to_matrix(&self, columns: &[String]) -> Result<Array2<f64>> {
        for name in columns {
            if !self.has_column(name) {
                return Err(Error::ColumnNotFound(name.clone()));
            }
        }
        Ok(self.fill_matrix(columns))
    }

    /// Dense matrix reindexed to the named columns: absent columns fill with
    /// 0.0, columns not named are dropped
    pub fn reindex_matrix(&self, columns: &[String]) -> Array2<f64> {
        self.fill_matrix(columns)
    }

    fn fill_matrix(&self, columns: &[String]) -> Array2<f64> {
        let resolved: Vec<Option<&[Value]>> =
            columns.iter().map(|name| self.column(name)).collect();
        Array2::from_shape_fn((self.n_rows(), columns.len()), |(i, j)| {
            resolved[j]
                .and_then(|col| col[i].as_f64())
                .unwrap_or(0.0)
        })
    }
}
