//! Result projection
//!
//! Pure, driver-independent transforms from raw driver result sets into the
//! shapes returned by the repository: tables, multi-table collections, a
//! single row, or a single typed scalar.

use super::error::{DatabaseError, Result};
use super::table::{MultiTabularResult, RawResultSet, Row, TabularResult};
use super::value::FromDatabaseValue;
use std::sync::Arc;

/// Name given to the first table of a multi-result execution
pub const DEFAULT_TABLE_NAME: &str = "Table";

/// Make column names unique
///
/// The first occurrence keeps its name; later duplicates get the smallest
/// numeric suffix not already in use (`id`, `id1`, `id2`, ...).
pub fn unique_column_names(columns: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(columns.len());
    for name in columns.iter() {
        if !unique.contains(name) {
            unique.push(name.clone());
            continue;
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}{}", name, suffix);
            // a later original column may already carry this name
            if !unique.contains(&candidate) && !columns.contains(&candidate) {
                unique.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    unique
}

/// Shape a raw result set into a table
///
/// # Errors
///
/// Returns [`DatabaseError::DataAccess`] if a row's width differs from the
/// column count
pub fn project_table(raw: RawResultSet) -> Result<TabularResult> {
    let width = raw.columns.len();
    let columns: Arc<[String]> = unique_column_names(raw.columns).into();

    let rows = raw
        .rows
        .into_iter()
        .enumerate()
        .map(|(i, cells)| {
            if cells.len() != width {
                return Err(DatabaseError::data_access(
                    "<result projection>",
                    format!("row {} has {} cells, expected {}", i, cells.len(), width),
                ));
            }
            Ok(Row::new(Arc::clone(&columns), cells))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TabularResult::from_parts(columns, rows))
}

/// Name of the `index`-th table of a multi-result execution
pub fn default_table_name(index: usize) -> String {
    if index == 0 {
        DEFAULT_TABLE_NAME.to_string()
    } else {
        format!("{}{}", DEFAULT_TABLE_NAME, index)
    }
}

/// Shape every result set, naming them `Table`, `Table1`, ...
pub fn project_multi_table(raws: Vec<RawResultSet>) -> Result<MultiTabularResult> {
    let mut multi = MultiTabularResult::new();
    for (i, raw) in raws.into_iter().enumerate() {
        multi.insert(default_table_name(i), project_table(raw)?);
    }
    Ok(multi)
}

/// First row of the result, `None` when there are no rows
pub fn project_row(raw: RawResultSet) -> Result<Option<Row>> {
    Ok(project_table(raw)?.into_rows().into_iter().next())
}

/// First column of the first row converted to `T`
///
/// No rows and a `NULL` cell both yield `None`.
///
/// # Errors
///
/// Returns [`DatabaseError::TypeConversion`] if the cell does not convert
pub fn project_scalar<T: FromDatabaseValue>(raw: RawResultSet) -> Result<Option<T>> {
    match project_row(raw)? {
        Some(row) => scalar_from_row(&row),
        None => Ok(None),
    }
}

/// First cell of `row` converted to `T`; `NULL` or no cells yield `None`
pub fn scalar_from_row<T: FromDatabaseValue>(row: &Row) -> Result<Option<T>> {
    match row.get_index(0) {
        Some(value) if !value.is_null() => T::from_database_value(value).map(Some),
        _ => Ok(None),
    }
}
