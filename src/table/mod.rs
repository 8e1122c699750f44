//! # Typed Tables
//!
//! Every sequence, metadata and measurement table flowing through msqc is held
//! in a [`Table`]: named columns with a declared [`ColumnType`], a key column
//! used for identity joins, a positional row index and rows of optional cells.
//!
//! Tables are validated once, at ingestion (CSV, Parquet or transport JSON),
//! against a [`TableSchema`]. A missing cell is `None`, never a default value.
//!
//! ## Dual readings
//!
//! Some exports embed the library delta next to the reading, e.g. `"7.55: 0.071"`.
//! Columns declared as [`ColumnType::Reading`] accept both plain floats and this
//! form; the string is split on the first colon into [`Cell::Dual`].

mod csv_io;
mod error;
mod parquet_io;
mod schema;
mod transport;

#[cfg(test)]
mod tests;

use std::fmt;

pub use error::TableError;
pub use schema::{metadata_columns, sequence_columns, ColumnType, TableSchema};
pub use transport::{ScalarMap, TransportTable};

/// Tokens read as an absent cell
pub const NULL_TOKENS: &[&str] = &["", "nan", "NaN", "None", "null", "NA"];

/// A single present table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Floating point reading
    Float(f64),
    /// Free text
    Text(String),
    /// Reading with its embedded delta versus the library reference
    Dual {
        /// Primary reading (left of the colon)
        value: f64,
        /// Delta versus library (right of the colon)
        delta: f64,
    },
}

impl Cell {
    /// Parse raw cell text as `ty`. Null tokens yield `Ok(None)`.
    pub fn parse(raw: &str, ty: ColumnType) -> Result<Option<Cell>, String> {
        let raw = raw.trim();
        if NULL_TOKENS.contains(&raw) {
            return Ok(None);
        }
        Cell::parse_present(raw, ty).map(Some)
    }

    /// Parse text known to hold a value. Text cells are kept verbatim, so
    /// `"NA"` stays text.
    pub fn parse_present(raw: &str, ty: ColumnType) -> Result<Cell, String> {
        match ty {
            ColumnType::Text => Ok(Cell::Text(raw.to_string())),
            ColumnType::Float => parse_finite(raw.trim()).map(Cell::Float),
            ColumnType::Reading => {
                let raw = raw.trim();
                if let Ok(value) = parse_finite(raw) {
                    return Ok(Cell::Float(value));
                }
                let (left, right) = raw
                    .split_once(':')
                    .ok_or_else(|| format!("'{}' is neither a number nor 'value: delta'", raw))?;
                let value = parse_finite(left.trim())?;
                let delta = parse_finite(right.trim())?;
                Ok(Cell::Dual { value, delta })
            }
        }
    }

    /// Numeric reading (the primary value of a dual cell)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Dual { value, .. } => Some(*value),
            Cell::Text(_) => None,
        }
    }

    /// Embedded library delta of a dual cell
    pub fn delta(&self) -> Option<f64> {
        match self {
            Cell::Dual { delta, .. } => Some(*delta),
            _ => None,
        }
    }

    /// Text content of a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Dual { value, delta } => write!(f, "{}: {}", value, delta),
        }
    }
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("'{}' is not a finite number", raw)),
        Err(_) => Err(format!("'{}' is not a number", raw)),
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column header
    pub name: String,
    /// Declared scalar type
    pub dtype: ColumnType,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// One row of optional cells
pub type Row = Vec<Option<Cell>>;

/// A strongly typed table keyed by one text column
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    key: usize,
    index: Vec<usize>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table. `key` is the position of the identity column.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, key: usize) -> Result<Self, TableError> {
        if key >= columns.len() {
            return Err(TableError::InvalidFormat(format!(
                "key column {} out of range for {} columns",
                key,
                columns.len()
            )));
        }
        if columns[key].dtype != ColumnType::Text {
            return Err(TableError::InvalidFormat(format!(
                "key column '{}' must be text",
                columns[key].name
            )));
        }
        Ok(Self {
            name: name.into(),
            columns,
            key,
            index: Vec::new(),
            rows: Vec::new(),
        })
    }

    /// Append a row, checking its width and cell types
    pub fn push_row(&mut self, row: Row) -> Result<(), TableError> {
        let label = self.index.last().map(|i| i + 1).unwrap_or(0);
        self.push_indexed_row(label, row)
    }

    pub(crate) fn push_indexed_row(&mut self, label: usize, row: Row) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RaggedRow {
                row: self.rows.len(),
                found: row.len(),
                expected: self.columns.len(),
            });
        }
        for (column, cell) in self.columns.iter().zip(&row) {
            let fits = match (column.dtype, cell) {
                (_, None) => true,
                (ColumnType::Text, Some(Cell::Text(_))) => true,
                (ColumnType::Float, Some(Cell::Float(_))) => true,
                (ColumnType::Reading, Some(Cell::Float(_) | Cell::Dual { .. })) => true,
                _ => false,
            };
            if !fits {
                return Err(TableError::InvalidValue {
                    column: column.name.clone(),
                    row: self.rows.len(),
                    value: cell.as_ref().map(|c| c.to_string()).unwrap_or_default(),
                    expected: column.dtype,
                });
            }
        }
        self.index.push(label);
        self.rows.push(row);
        Ok(())
    }

    /// Table name, used in error and log context
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the table
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// All columns, in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column headers, in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of the key column
    pub fn key_position(&self) -> usize {
        self.key
    }

    /// Name of the key column
    pub fn key_column(&self) -> &str {
        &self.columns[self.key].name
    }

    /// Non-key column headers, in order
    pub fn value_columns(&self) -> impl Iterator<Item = &str> {
        let key = self.key;
        self.columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != key)
            .map(|(_, c)| c.name.as_str())
    }

    /// Row index labels (positions in the source table)
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// All rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Key values in row order (absent keys are skipped)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let key = self.key;
        self.rows
            .iter()
            .filter_map(move |row| row[key].as_ref().and_then(Cell::as_text))
    }

    /// First row whose key equals `key` exactly
    pub fn find_row(&self, key: &str) -> Option<&Row> {
        let position = self.key;
        self.rows
            .iter()
            .find(|row| matches!(&row[position], Some(Cell::Text(k)) if k == key))
    }

    /// Cell at (row key, column); `None` when either is absent or the cell is null
    pub fn get(&self, key: &str, column: &str) -> Option<&Cell> {
        let column = self.column_index(column)?;
        self.find_row(key)?.get(column)?.as_ref()
    }

    /// Rows whose `column` is a text cell equal to `value`.
    ///
    /// Index labels of the source rows are kept. No match yields an empty
    /// table with the same columns.
    pub fn filter_eq(&self, column: &str, value: &str) -> Table {
        let mut out = Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            key: self.key,
            index: Vec::new(),
            rows: Vec::new(),
        };
        if let Some(position) = self.column_index(column) {
            for (label, row) in self.index.iter().zip(&self.rows) {
                if matches!(&row[position], Some(Cell::Text(v)) if v == value) {
                    out.index.push(*label);
                    out.rows.push(row.clone());
                }
            }
        }
        out
    }
}
