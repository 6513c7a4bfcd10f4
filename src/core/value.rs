//! Cell value types
//!
//! This module defines the dynamically-typed values stored in result cells and
//! bound as statement parameters, and the typed conversions used by the scalar
//! projection.

use super::error::{DatabaseError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Formats accepted when parsing timestamps from text
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Exact decimal kept in its textual form
    Decimal(String),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
    /// Timestamp in UTC
    TimestampTz(DateTime<Utc>),
}

impl DatabaseValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v != 0),
            DatabaseValue::Long(v) => Some(*v != 0),
            DatabaseValue::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Get the value as an i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Long(v) => i32::try_from(*v).ok(),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Float(v) => Some(*v as f64),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::Long(v) => Some(*v as f64),
            DatabaseValue::Decimal(s) | DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string (zero-copy for String values)
    ///
    /// Returns a string reference without cloning for String values.
    /// For other types, use `as_string()` which performs conversion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as a string (with conversion)
    ///
    /// Dates and times are rendered as ISO-8601.
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::Bool(v) => v.to_string(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Long(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::Decimal(s) => s.clone(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => format!("<{} bytes>", b.len()),
            DatabaseValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            DatabaseValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            DatabaseValue::Timestamp(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            DatabaseValue::TimestampTz(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::Decimal(_) => "decimal",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Date(_) => "date",
            DatabaseValue::Time(_) => "time",
            DatabaseValue::Timestamp(_) => "timestamp",
            DatabaseValue::TimestampTz(_) => "timestamptz",
        }
    }

    /// Convert into `T`, failing with a type conversion error
    pub fn convert<T: FromDatabaseValue>(&self) -> Result<T> {
        T::from_database_value(self)
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(v: &String) -> Self {
        DatabaseValue::String(v.clone())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl From<NaiveDate> for DatabaseValue {
    fn from(v: NaiveDate) -> Self {
        DatabaseValue::Date(v)
    }
}

impl From<NaiveTime> for DatabaseValue {
    fn from(v: NaiveTime) -> Self {
        DatabaseValue::Time(v)
    }
}

impl From<NaiveDateTime> for DatabaseValue {
    fn from(v: NaiveDateTime) -> Self {
        DatabaseValue::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(v: DateTime<Utc>) -> Self {
        DatabaseValue::TimestampTz(v)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Typed conversion out of a [`DatabaseValue`]
///
/// Conversions are best-effort and string based: a value converts when its
/// textual form parses as the target type. Nothing is truncated, so `3.5`
/// does not become `3`.
pub trait FromDatabaseValue: Sized {
    /// Name used in conversion errors
    const TYPE_NAME: &'static str;

    /// Convert `value`, failing with [`DatabaseError::TypeConversion`]
    fn from_database_value(value: &DatabaseValue) -> Result<Self>;
}

fn conversion_error<T: FromDatabaseValue>(value: &DatabaseValue) -> DatabaseError {
    DatabaseError::type_conversion(T::TYPE_NAME, value.type_name(), value.as_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse the textual form of any non-null, non-binary value
fn parse_text<T>(value: &DatabaseValue) -> Result<T>
where
    T: FromDatabaseValue + FromStr,
{
    match value {
        DatabaseValue::Null | DatabaseValue::Bytes(_) => Err(conversion_error::<T>(value)),
        other => other
            .as_string()
            .trim()
            .parse()
            .map_err(|_| conversion_error::<T>(value)),
    }
}

macro_rules! impl_from_text {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromDatabaseValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_database_value(value: &DatabaseValue) -> Result<Self> {
                    parse_text(value)
                }
            }
        )*
    };
}

impl_from_text!(i16 => "i16", i32 => "i32", i64 => "i64", f32 => "f32", f64 => "f64");

impl FromDatabaseValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::Null => Err(conversion_error::<Self>(value)),
            DatabaseValue::Bytes(b) => {
                String::from_utf8(b.clone()).map_err(|_| conversion_error::<Self>(value))
            }
            other => Ok(other.as_string()),
        }
    }
}

impl FromDatabaseValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::Bool(v) => Ok(*v),
            DatabaseValue::Int(_) | DatabaseValue::Long(_) | DatabaseValue::String(_) => value
                .as_bool()
                .ok_or_else(|| conversion_error::<Self>(value)),
            _ => Err(conversion_error::<Self>(value)),
        }
    }
}

impl FromDatabaseValue for NaiveDate {
    const TYPE_NAME: &'static str = "date";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::Date(d) => Ok(*d),
            DatabaseValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| conversion_error::<Self>(value)),
            _ => Err(conversion_error::<Self>(value)),
        }
    }
}

impl FromDatabaseValue for NaiveTime {
    const TYPE_NAME: &'static str = "time";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::Time(t) => Ok(*t),
            DatabaseValue::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
                .map_err(|_| conversion_error::<Self>(value)),
            _ => Err(conversion_error::<Self>(value)),
        }
    }
}

impl FromDatabaseValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "timestamp";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::Timestamp(ts) => Ok(*ts),
            DatabaseValue::TimestampTz(ts) => Ok(ts.naive_utc()),
            DatabaseValue::String(s) => {
                let s = s.trim();
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .ok_or_else(|| conversion_error::<Self>(value))
            }
            _ => Err(conversion_error::<Self>(value)),
        }
    }
}

impl FromDatabaseValue for DateTime<Utc> {
    const TYPE_NAME: &'static str = "timestamptz";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        match value {
            DatabaseValue::TimestampTz(ts) => Ok(*ts),
            DatabaseValue::Timestamp(ts) => Ok(ts.and_utc()),
            DatabaseValue::String(s) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(ts) => Ok(ts.with_timezone(&Utc)),
                // Naive text is taken as UTC
                Err(_) => NaiveDateTime::from_database_value(value)
                    .map(|ts| ts.and_utc())
                    .map_err(|_| conversion_error::<Self>(value)),
            },
            _ => Err(conversion_error::<Self>(value)),
        }
    }
}

impl FromDatabaseValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| conversion_error::<Self>(value))
    }
}

impl FromDatabaseValue for DatabaseValue {
    const TYPE_NAME: &'static str = "value";

    fn from_database_value(value: &DatabaseValue) -> Result<Self> {
        Ok(value.clone())
    }
}
