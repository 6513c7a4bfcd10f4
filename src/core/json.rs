//! JSON projection
//!
//! Tables serialize as an array of row objects whose keys are the column
//! names in column order. A multi-table result serializes as one indented
//! object keyed by table name, in insertion order.
//!
//! | Cell | JSON |
//! |---|---|
//! | `Null` | `null` |
//! | `Bool` | boolean |
//! | `Int`, `Long`, `Float`, `Double`, `Decimal` | number |
//! | `String` | string |
//! | `Bytes` | base64 string |
//! | `Date`, `Time`, `Timestamp`, `TimestampTz` | ISO-8601 string |
//!
//! Non-finite floats and decimals that are not numbers fail with
//! [`DatabaseError::Serialization`] instead of being written as `null`.

use super::error::{DatabaseError, Result};
use super::table::{MultiTabularResult, TabularResult};
use super::value::DatabaseValue;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value};
use std::str::FromStr;

/// Convert one cell, located at (`row`, `column`) for error reporting
pub fn cell_to_json(value: &DatabaseValue, column: &str, row: usize) -> Result<Value> {
    let json = match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(v) => Value::Bool(*v),
        DatabaseValue::Int(v) => Value::from(*v),
        DatabaseValue::Long(v) => Value::from(*v),
        DatabaseValue::Float(v) => {
            if !v.is_finite() {
                return Err(DatabaseError::serialization(
                    column,
                    row,
                    format!("non-finite float {}", v),
                ));
            }
            // Shortest f32 text, so 0.1f32 stays 0.1
            Value::Number(Number::from_str(&v.to_string()).map_err(|e| {
                DatabaseError::serialization(column, row, e.to_string())
            })?)
        }
        DatabaseValue::Double(v) => Value::Number(Number::from_f64(*v).ok_or_else(|| {
            DatabaseError::serialization(column, row, format!("non-finite float {}", v))
        })?),
        DatabaseValue::Decimal(s) => match Number::from_str(s.trim()) {
            Ok(n) => Value::Number(n),
            Err(_) => {
                return Err(DatabaseError::serialization(
                    column,
                    row,
                    format!("decimal '{}' is not a JSON number", s),
                ))
            }
        },
        DatabaseValue::String(s) => Value::String(s.clone()),
        DatabaseValue::Bytes(b) => Value::String(STANDARD.encode(b)),
        DatabaseValue::Date(_)
        | DatabaseValue::Time(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::TimestampTz(_) => Value::String(value.as_string()),
    };
    Ok(json)
}

/// Table as a JSON array value
pub fn table_to_value(table: &TabularResult) -> Result<Value> {
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut object = Map::with_capacity(row.len());
            for (column, value) in row.iter() {
                object.insert(column.to_string(), cell_to_json(value, column, index)?);
            }
            Ok(Value::Object(object))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(rows))
}

/// Table as compact JSON text
///
/// # Errors
///
/// Returns [`DatabaseError::Serialization`] for a cell JSON cannot represent
pub fn table_to_json(table: &TabularResult) -> Result<String> {
    Ok(serde_json::to_string(&table_to_value(table)?)?)
}

/// Every table as an indented JSON object keyed by table name
///
/// # Errors
///
/// Returns [`DatabaseError::Serialization`] for a cell JSON cannot represent
pub fn multi_table_to_json(tables: &MultiTabularResult) -> Result<String> {
    let mut object = Map::with_capacity(tables.len());
    for (name, table) in tables.iter() {
        object.insert(name.to_string(), table_to_value(table)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(object))?)
}

impl TabularResult {
    /// Serialize with [`table_to_json`]
    pub fn to_json(&self) -> Result<String> {
        table_to_json(self)
    }
}

impl MultiTabularResult {
    /// Serialize with [`multi_table_to_json`]
    pub fn to_json(&self) -> Result<String> {
        multi_table_to_json(self)
    }
}
