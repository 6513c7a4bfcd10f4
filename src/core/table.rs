//! In-memory tabular results
//!
//! Tables are fully materialized and owned by the caller; they hold no
//! reference to the connection or statement that produced them.

use super::error::{DatabaseError, Result};
use super::value::{DatabaseValue, FromDatabaseValue};
use std::ops::Index;
use std::sync::Arc;

/// Result set exactly as a driver produced it
///
/// Column names may repeat; [`ResultProjector`](super::projector) turns this
/// into a [`TabularResult`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    /// Column names in statement order
    pub columns: Vec<String>,
    /// Rows of cells in column order
    pub rows: Vec<Vec<DatabaseValue>>,
}

impl RawResultSet {
    /// Create a raw result set
    pub fn new(columns: Vec<String>, rows: Vec<Vec<DatabaseValue>>) -> Self {
        Self { columns, rows }
    }
}

/// One row of a table, indexable by position and by column name
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<DatabaseValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<DatabaseValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Cell in column `name`
    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.column_index(name).map(|i| &self.values[i])
    }

    /// Cell at position `index`
    pub fn get_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    /// Cell in column `name` converted to `T`; `NULL` yields `None`
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ColumnNotFound`] for an unknown column and
    /// [`DatabaseError::TypeConversion`] if the cell does not convert.
    pub fn get_as<T: FromDatabaseValue>(&self, name: &str) -> Result<Option<T>> {
        let value = self
            .get(name)
            .ok_or_else(|| DatabaseError::ColumnNotFound(name.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        T::from_database_value(value).map(Some)
    }

    /// Position of column `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cells in column order
    pub fn values(&self) -> &[DatabaseValue] {
        &self.values
    }

    /// (column, cell) pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the cells
    pub fn into_values(self) -> Vec<DatabaseValue> {
        self.values
    }
}

impl Index<&str> for Row {
    type Output = DatabaseValue;

    /// # Panics
    ///
    /// Panics if the row has no column `name`
    fn index(&self, name: &str) -> &DatabaseValue {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no column named '{}' in row", name),
        }
    }
}

impl Index<usize> for Row {
    type Output = DatabaseValue;

    fn index(&self, index: usize) -> &DatabaseValue {
        &self.values[index]
    }
}

/// Ordered named columns and ordered rows
///
/// Every row has exactly one cell per column and column names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularResult {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl TabularResult {
    pub(crate) fn from_parts(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row at `index`
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// First row
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take the rows
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a TabularResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Tables keyed by name, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiTabularResult {
    tables: Vec<(String, TabularResult)>,
}

impl MultiTabularResult {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `table` under `name`; an existing table of that name is replaced in place
    pub fn insert(&mut self, name: impl Into<String>, table: TabularResult) {
        let name = name.into();
        match self.tables.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = table,
            None => self.tables.push((name, table)),
        }
    }

    /// Table named `name`
    pub fn get(&self, name: &str) -> Option<&TabularResult> {
        self.tables.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Table at position `index`
    pub fn get_index(&self, index: usize) -> Option<&TabularResult> {
        self.tables.get(index).map(|(_, t)| t)
    }

    /// Rename table `from` to `to`, keeping its position
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidInput`] if `from` does not exist or
    /// `to` is already taken by another table
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> Result<()> {
        let to = to.into();
        if from != to && self.get(&to).is_some() {
            return Err(DatabaseError::invalid_input(format!(
                "table name '{}' already in use",
                to
            )));
        }
        let entry = self
            .tables
            .iter_mut()
            .find(|(n, _)| n == from)
            .ok_or_else(|| DatabaseError::invalid_input(format!("no table named '{}'", from)))?;
        entry.0 = to;
        Ok(())
    }

    /// Table names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(n, _)| n.as_str())
    }

    /// (name, table) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TabularResult)> {
        self.tables.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the collection holds no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
