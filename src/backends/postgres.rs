//! Pooled PostgreSQL driver
//!
//! This module provides a connection-pooled PostgreSQL implementation of the
//! [`Driver`] trait using deadpool-postgres and tokio-postgres.
//!
//! `@name` placeholders are rewritten to `$n` before preparing; statements
//! written with `$n` directly bind `param1`, `param2`, ... by position.
//! Values are converted to the parameter type the server declares, so a
//! string map can feed integer, date or numeric columns. Prepared statements
//! are cached per connection.

use crate::core::{
    config::RepositoryConfig,
    database_types::DatabaseType,
    driver::{Connection, Driver},
    error::{BoxError, DatabaseError, Result},
    parameters::{rewrite_named_placeholders, Parameters, GENERATED_PARAMETER_PREFIX},
    repository::Repository,
    table::RawResultSet,
    value::{DatabaseValue, FromDatabaseValue},
};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{
    Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime,
};
use std::time::Duration;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::{NoTls, Row, SimpleQueryMessage, Statement};
use tracing::{debug, error};

/// Repository backed by PostgreSQL
pub type PostgresRepository = Repository<PostgresDriver>;

/// Pooled PostgreSQL driver
#[derive(Clone)]
pub struct PostgresDriver {
    pool: Pool,
    acquire_timeout: Duration,
}

impl PostgresDriver {
    fn map_pool_error(&self, err: PoolError) -> DatabaseError {
        match err {
            PoolError::Timeout(_) => {
                DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
            }
            PoolError::Backend(e) => {
                DatabaseError::connection_with_source("Failed to open PostgreSQL connection", e)
            }
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        }
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    type Connection = PostgresConnection;

    async fn connect(config: &RepositoryConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let pg_config: tokio_postgres::Config = config.connection_string.parse().map_err(|e| {
            DatabaseError::configuration(format!("Invalid PostgreSQL connection string: {}", e))
        })?;

        let mut manager_config = ManagerConfig::default();
        manager_config.recycling_method = RecyclingMethod::Fast;
        let manager = Manager::from_config(pg_config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(config.acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DatabaseError::configuration(format!("Failed to create pool: {}", e)))?;

        let driver = Self {
            pool,
            acquire_timeout: config.acquire_timeout,
        };

        // Fail fast on unreachable servers and bad credentials
        drop(driver.acquire().await?);

        debug!(max_size = config.max_connections, "PostgreSQL pool ready");
        Ok(driver)
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn acquire(&self) -> Result<PostgresConnection> {
        let object = self.pool.get().await.map_err(|e| self.map_pool_error(e))?;
        Ok(PostgresConnection {
            object: Some(object),
            discarded: false,
        })
    }
}

/// Pooled PostgreSQL connection
pub struct PostgresConnection {
    object: Option<Object>,
    discarded: bool,
}

type PgArgument = Box<dyn ToSql + Sync + Send>;

impl PostgresConnection {
    fn client(&self) -> Result<&Object> {
        self.object
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Connection already released"))
    }

    /// Prepare `sql` and convert `params` to its declared parameter types
    async fn prepare(&self, sql: &str, params: &Parameters) -> Result<(Statement, Vec<PgArgument>)> {
        let client = self.client()?;
        let positional = rewrite_named_placeholders(sql);
        let stmt = client.prepare_cached(&positional.sql).await?;

        let names: Vec<String> = if positional.names.is_empty() {
            (1..=stmt.params().len())
                .map(|i| format!("{}{}", GENERATED_PARAMETER_PREFIX, i))
                .collect()
        } else {
            positional.names.iter().map(|name| format!("@{}", name)).collect()
        };

        let args = names
            .iter()
            .zip(stmt.params())
            .map(|(name, ty)| {
                let value = params
                    .get(name)
                    .ok_or_else(|| DatabaseError::MissingParameter(name.clone()))?;
                value_to_param(value, ty)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((stmt, args))
    }
}

fn argument_refs(args: &[PgArgument]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter()
        .map(|arg| arg.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn query(&mut self, sql: &str, params: &Parameters) -> Result<RawResultSet> {
        let (stmt, args) = self.prepare(sql, params).await?;
        let rows = self.client()?.query(&stmt, &argument_refs(&args)).await?;

        let columns = stmt
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;

        Ok(RawResultSet::new(columns, rows))
    }

    /// Without parameters the text runs through the simple-query protocol,
    /// which allows several statements but returns every cell as text. With
    /// parameters it must be a single statement.
    async fn query_multiple(
        &mut self,
        sql: &str,
        params: &Parameters,
    ) -> Result<Vec<RawResultSet>> {
        if !params.is_empty() {
            return Ok(vec![self.query(sql, params).await?]);
        }

        let messages = self.client()?.simple_query(sql).await?;
        let mut results = Vec::new();
        let mut current: Option<RawResultSet> = None;

        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    results.extend(current.take());
                    current = Some(RawResultSet::new(
                        columns.iter().map(|c| c.name().to_string()).collect(),
                        Vec::new(),
                    ));
                }
                SimpleQueryMessage::Row(row) => {
                    let cells = (0..row.len())
                        .map(|i| {
                            row.get(i)
                                .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.to_string()))
                        })
                        .collect();
                    current
                        .get_or_insert_with(|| {
                            RawResultSet::new(
                                row.columns().iter().map(|c| c.name().to_string()).collect(),
                                Vec::new(),
                            )
                        })
                        .rows
                        .push(cells);
                }
                SimpleQueryMessage::CommandComplete(_) => results.extend(current.take()),
                _ => {}
            }
        }
        results.extend(current.take());

        Ok(results)
    }

    async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        let (stmt, args) = self.prepare(sql, params).await?;
        Ok(self.client()?.execute(&stmt, &argument_refs(&args)).await?)
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(self.client()?.batch_execute("BEGIN").await?)
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(self.client()?.batch_execute("COMMIT").await?)
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(self.client()?.batch_execute("ROLLBACK").await?)
    }

    fn discard(&mut self) {
        self.discarded = true;
    }
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        if !self.discarded {
            return;
        }
        if let Some(object) = self.object.take() {
            error!("Discarding PostgreSQL connection");
            // Closing the client ends the session; the server rolls back any open transaction
            drop(Object::take(object));
        }
    }
}

/// Convert DatabaseValue to a parameter of the declared type
fn value_to_param(value: &DatabaseValue, ty: &Type) -> Result<PgArgument> {
    if value.is_null() {
        return Ok(Box::new(PgParam::Null));
    }

    let param: PgArgument = match ty.name() {
        "bool" => Box::new(bool::from_database_value(value)?),
        "int2" => Box::new(i16::from_database_value(value)?),
        "int4" => Box::new(i32::from_database_value(value)?),
        "int8" => Box::new(i64::from_database_value(value)?),
        "float4" => Box::new(f32::from_database_value(value)?),
        "float8" => Box::new(f64::from_database_value(value)?),
        "date" => Box::new(NaiveDate::from_database_value(value)?),
        "time" => Box::new(NaiveTime::from_database_value(value)?),
        "timestamp" => Box::new(NaiveDateTime::from_database_value(value)?),
        "timestamptz" => Box::new(DateTime::<Utc>::from_database_value(value)?),
        "bytea" => Box::new(Vec::<u8>::from_database_value(value)?),
        "numeric" => match value {
            DatabaseValue::Bool(_) | DatabaseValue::Bytes(_) => {
                return Err(DatabaseError::type_conversion(
                    "numeric",
                    value.type_name(),
                    value.as_string(),
                ))
            }
            other => Box::new(PgParam::Numeric(other.as_string())),
        },
        "uuid" => Box::new(PgParam::Uuid(parse_uuid(value)?)),
        "json" | "jsonb" => Box::new(PgParam::Json(String::from_database_value(value)?)),
        _ => Box::new(String::from_database_value(value)?),
    };
    Ok(param)
}

/// Parameters tokio-postgres has no plain Rust type for here
#[derive(Debug)]
enum PgParam {
    Null,
    Numeric(String),
    Uuid([u8; 16]),
    Json(String),
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            PgParam::Null => return Ok(IsNull::Yes),
            PgParam::Numeric(text) => encode_numeric(text, out)?,
            PgParam::Uuid(bytes) => out.extend_from_slice(bytes),
            PgParam::Json(text) => {
                if *ty == Type::JSONB {
                    out.extend_from_slice(&[1]);
                }
                out.extend_from_slice(text.as_bytes());
            }
        }
        Ok(IsNull::No)
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn parse_uuid(value: &DatabaseValue) -> Result<[u8; 16]> {
    let invalid = || DatabaseError::type_conversion("uuid", value.type_name(), value.as_string());
    let text = value.as_str().ok_or_else(invalid)?;
    let hex: String = text.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return Err(invalid());
    }

    let mut bytes = [0u8; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(bytes)
}

fn decode_row(row: &Row) -> Result<Vec<DatabaseValue>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_cell(row, idx, column.type_()))
        .collect()
}

fn decode_cell(row: &Row, idx: usize, ty: &Type) -> Result<DatabaseValue> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(DatabaseValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| DatabaseValue::Int(v.into())),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(DatabaseValue::Int),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(DatabaseValue::Long),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| DatabaseValue::Long(v.into())),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(DatabaseValue::Float),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(DatabaseValue::Double),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => row
            .try_get::<_, Option<String>>(idx)?
            .map(DatabaseValue::String),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(DatabaseValue::Bytes),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.map(DatabaseValue::Date),
        "time" => row.try_get::<_, Option<NaiveTime>>(idx)?.map(DatabaseValue::Time),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(DatabaseValue::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(DatabaseValue::TimestampTz),
        _ => row.try_get::<_, Option<PgFallback>>(idx)?.map(|v| v.0),
    };
    Ok(value.unwrap_or(DatabaseValue::Null))
}

/// Cells of types without a dedicated branch in [`decode_cell`]
struct PgFallback(DatabaseValue);

impl<'a> FromSql<'a> for PgFallback {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        let value = match ty.name() {
            "numeric" => DatabaseValue::Decimal(decode_numeric(raw)?),
            "uuid" => DatabaseValue::String(format_uuid(raw)?),
            "json" => DatabaseValue::String(std::str::from_utf8(raw)?.to_string()),
            "jsonb" => match raw.split_first() {
                Some((&1, body)) => DatabaseValue::String(std::str::from_utf8(body)?.to_string()),
                _ => return Err("unsupported jsonb format version".into()),
            },
            _ => match ty.kind() {
                Kind::Enum(_) => DatabaseValue::String(std::str::from_utf8(raw)?.to_string()),
                _ => DatabaseValue::Bytes(raw.to_vec()),
            },
        };
        Ok(PgFallback(value))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn format_uuid(raw: &[u8]) -> std::result::Result<String, BoxError> {
    if raw.len() != 16 {
        return Err(format!("invalid uuid length {}", raw.len()).into());
    }
    let mut out = String::with_capacity(36);
    for (i, byte) in raw.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{:02x}", byte));
    }
    Ok(out)
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary NUMERIC format into its decimal text
fn decode_numeric(raw: &[u8]) -> std::result::Result<String, BoxError> {
    let word = |i: usize| -> std::result::Result<u16, BoxError> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16 as i32;
    let sign = word(2)?;
    let dscale = word(3)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {:#x}", other).into()),
    }

    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<std::result::Result<Vec<u16>, BoxError>>()?;
    // digits[p] carries weight (weight - p) in base 10000
    let digit_at = |pos: i32| -> u16 {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(0).to_string());
        for pos in 1..=weight {
            out.push_str(&format!("{:04}", digit_at(pos)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(pos)));
            pos += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Encode decimal text (`-12.50`, `NaN`) in the binary NUMERIC format
fn encode_numeric(text: &str, out: &mut BytesMut) -> std::result::Result<(), BoxError> {
    let text = text.trim();
    let invalid = || -> BoxError { format!("invalid numeric value '{}'", text).into() };

    let header = |out: &mut BytesMut, ndigits: usize, weight: i32, sign: u16, dscale: usize| {
        out.extend_from_slice(&(ndigits as u16).to_be_bytes());
        out.extend_from_slice(&(weight as i16).to_be_bytes());
        out.extend_from_slice(&sign.to_be_bytes());
        out.extend_from_slice(&(dscale as u16).to_be_bytes());
    };

    if text.eq_ignore_ascii_case("nan") {
        header(out, 0, 0, NUMERIC_NAN, 0);
        return Ok(());
    }

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (NUMERIC_NEG, rest),
        None => (NUMERIC_POS, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let dscale = frac_part.len();
    let int_digits = int_part.trim_start_matches('0');

    // Left-pad the integer part and right-pad the fraction to whole base-10000 groups
    let int_pad = (4 - int_digits.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let padded: String = "0".repeat(int_pad)
        + int_digits
        + frac_part
        + &"0".repeat(frac_pad);

    let groups: Vec<u16> = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'))
        })
        .collect();

    let int_groups = (int_digits.len() + int_pad) / 4;
    let mut weight = int_groups as i32 - 1;

    let mut start = 0;
    while start < groups.len() && groups[start] == 0 {
        start += 1;
        weight -= 1;
    }
    let mut end = groups.len();
    while end > start && groups[end - 1] == 0 {
        end -= 1;
    }

    let digits = &groups[start..end];
    if digits.is_empty() {
        header(out, 0, 0, NUMERIC_POS, dscale);
        return Ok(());
    }

    header(out, digits.len(), weight, sign, dscale);
    for digit in digits {
        out.extend_from_slice(&digit.to_be_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repository::DataRepository;
    use crate::core::QueryPattern;

    fn get_postgres_url() -> Option<String> {
        std::env::var("POSTGRES_URL").ok()
    }

    fn numeric(digits: &[u16], weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_decode_numeric() {
        assert_eq!(decode_numeric(&numeric(&[12, 5000], 0, NUMERIC_POS, 2)).unwrap(), "12.50");
        assert_eq!(decode_numeric(&numeric(&[1], 1, NUMERIC_POS, 0)).unwrap(), "10000");
        assert_eq!(decode_numeric(&numeric(&[12], -1, NUMERIC_NEG, 4)).unwrap(), "-0.0012");
        assert_eq!(decode_numeric(&numeric(&[], 0, NUMERIC_POS, 0)).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(&[], 0, NUMERIC_NAN, 0)).unwrap(), "NaN");
        assert!(decode_numeric(&[0, 1]).is_err());
    }

    #[test]
    fn test_encode_numeric() {
        let mut out = BytesMut::new();
        encode_numeric("-12.50", &mut out).unwrap();
        assert_eq!(out.to_vec(), numeric(&[12, 5000], 0, NUMERIC_NEG, 2));

        let mut out = BytesMut::new();
        encode_numeric("10000", &mut out).unwrap();
        assert_eq!(out.to_vec(), numeric(&[1], 1, NUMERIC_POS, 0));

        let mut out = BytesMut::new();
        encode_numeric("0.0012", &mut out).unwrap();
        assert_eq!(out.to_vec(), numeric(&[12], -1, NUMERIC_POS, 4));

        assert!(encode_numeric("1e5", &mut BytesMut::new()).is_err());
        assert!(encode_numeric(".", &mut BytesMut::new()).is_err());
    }

    #[test]
    fn test_uuid_text() {
        let bytes = parse_uuid(&"67e55044-10b1-426f-9247-bb680e5fe0c8".into()).unwrap();
        assert_eq!(format_uuid(&bytes).unwrap(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(parse_uuid(&"not-a-uuid".into()).is_err());
    }

    #[test]
    fn test_value_to_param_checks_declared_type() {
        assert!(value_to_param(&"42".into(), &Type::INT4).is_ok());
        assert!(value_to_param(&DatabaseValue::Null, &Type::NUMERIC).is_ok());
        assert!(matches!(
            value_to_param(&"forty-two".into(), &Type::INT4),
            Err(DatabaseError::TypeConversion { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_repository_round_trip() -> Result<()> {
        let url = match get_postgres_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: POSTGRES_URL not set");
                return Ok(());
            }
        };

        let repo = PostgresRepository::connect(RepositoryConfig::new(url)).await?;
        repo.save_changes(&[
            QueryPattern::new("DROP TABLE IF EXISTS repo_points")?,
            QueryPattern::new(
                "CREATE TABLE repo_points (id SERIAL PRIMARY KEY, name TEXT, value NUMERIC, taken DATE)",
            )?,
            QueryPattern::new("INSERT INTO repo_points (name, value, taken) VALUES (@name, @value, @taken)")?
                .with_parameters([("@name", "P1"), ("@value", "12.50"), ("@taken", "2024-05-01")])
                .with_parameters(Parameters::new().with("@name", "P2").with("@value", DatabaseValue::Null).with("@taken", DatabaseValue::Null)),
        ])
        .await?;

        let table = repo
            .fetch_table("SELECT name, value, taken FROM repo_points ORDER BY id", None)
            .await?;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0]["value"], DatabaseValue::Decimal("12.50".into()));
        assert!(table.rows()[1]["taken"].is_null());

        let count: Option<i64> = repo
            .fetch_scalar("SELECT COUNT(*) FROM repo_points WHERE name = @name", Some(&Parameters::new().with("@name", "P1")))
            .await?;
        assert_eq!(count, Some(1));

        let tables = repo
            .fetch_multi_table("SELECT name FROM repo_points; SELECT 1 AS one", None)
            .await?;
        assert_eq!(tables.names().collect::<Vec<_>>(), vec!["Table", "Table1"]);

        repo.save_changes(&[QueryPattern::new("DROP TABLE repo_points")?]).await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_save_changes_rolls_back() -> Result<()> {
        let url = match get_postgres_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: POSTGRES_URL not set");
                return Ok(());
            }
        };

        let repo = PostgresRepository::connect(RepositoryConfig::new(url)).await?;
        repo.save_changes(&[
            QueryPattern::new("DROP TABLE IF EXISTS repo_rollback")?,
            QueryPattern::new("CREATE TABLE repo_rollback (name TEXT NOT NULL)")?,
        ])
        .await?;

        let err = repo
            .save_changes(&[
                QueryPattern::new("INSERT INTO repo_rollback (name) VALUES ('kept?')")?,
                QueryPattern::new("INSERT INTO repo_rollback (name) VALUES (NULL)")?,
            ])
            .await
            .unwrap_err();
        assert_eq!(err.statement_index(), Some(1));

        let count: Option<i64> = repo
            .fetch_scalar("SELECT COUNT(*) FROM repo_rollback", None)
            .await?;
        assert_eq!(count, Some(0));

        repo.save_changes(&[QueryPattern::new("DROP TABLE repo_rollback")?]).await?;
        Ok(())
    }
}
