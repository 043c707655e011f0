// Table Model
// Minimal row-oriented dataframe exchanged between dataset transforms

pub mod value;

pub use value::Value;

use crate::transform::TransformError;

use serde::{Deserialize, Serialize};

/// A row of cell values, ordered like the owning table's columns
pub type Row = Vec<Value>;

/// Named columns plus rows in arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows, checking every row's arity
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, TransformError> {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from rows already known to match the column count
    pub(crate) fn from_rows_unchecked(columns: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column, failing with `UnknownColumn` when absent
    pub fn require_column(&self, name: &str) -> Result<usize, TransformError> {
        self.column_index(name).ok_or_else(|| TransformError::UnknownColumn {
            column: name.to_string(),
            available: self.columns.clone(),
        })
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), TransformError> {
        if row.len() != self.columns.len() {
            return Err(TransformError::ArityMismatch {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value at a row and named column
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of a named column, in row order
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// A table with the same columns holding rows from `offset` onwards
    pub fn slice_from(&self, offset: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().skip(offset).cloned().collect(),
        }
    }

    /// Same columns, no rows
    pub fn empty_like(&self) -> Table {
        Table::new(self.columns.clone())
    }

    /// Render a row as a JSON object keyed by column name
    pub fn row_to_json(&self, row: usize) -> Option<serde_json::Value> {
        let values = self.rows.get(row)?;
        let object = self
            .columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Some(serde_json::Value::Object(object))
    }
}
