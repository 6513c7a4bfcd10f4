//! Pooled SQLite driver
//!
//! This module provides a connection-pooled SQLite implementation of the
//! [`Driver`] trait using deadpool. Blocking rusqlite calls run on the
//! runtime's blocking pool through `interact`.
//!
//! Placeholders are bound by name: `@name`, `:name` and `$name` look up
//! `name` in the parameter map. Anonymous (`?`) and numbered (`?N`)
//! placeholders bind `param1`, `param2`, ... by position, which matches the
//! maps produced by [`build_parameter_map`](crate::core::build_parameter_map).

use crate::core::{
    config::RepositoryConfig,
    database_types::DatabaseType,
    driver::{Connection, Driver},
    error::{DatabaseError, Result},
    parameters::{Parameters, GENERATED_PARAMETER_PREFIX},
    repository::Repository,
    table::RawResultSet,
    value::DatabaseValue,
};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, PoolError, Runtime};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Batch, Statement, ToSql};
use std::time::Duration;
use tracing::{debug, error};

/// Path SQLite treats as a private in-memory database per connection
const IN_MEMORY_PATH: &str = ":memory:";

/// Repository backed by SQLite
pub type SqliteRepository = Repository<SqliteDriver>;

/// Pooled SQLite driver
///
/// Each connection has `PRAGMA foreign_keys = ON` and a busy timeout equal to
/// the acquire timeout; the database is switched to WAL journaling when the
/// driver connects. A `:memory:` database exists only inside one connection,
/// so the pool is capped at a single connection for it.
#[derive(Clone)]
pub struct SqliteDriver {
    pool: Pool,
    acquire_timeout: Duration,
}

impl SqliteDriver {
    fn map_pool_error(&self, err: PoolError) -> DatabaseError {
        match err {
            PoolError::Timeout(_) => {
                DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
            }
            PoolError::Backend(e) => {
                DatabaseError::connection_with_source("Failed to open SQLite connection", e)
            }
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Total number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of requests waiting for a connection
    pub waiting: usize,
}

#[async_trait]
impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    async fn connect(config: &RepositoryConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let path = config.connection_string.trim();
        let max_size = if path == IN_MEMORY_PATH {
            debug!("In-memory SQLite database, limiting pool to one connection");
            1
        } else {
            config.max_connections
        };

        let pool = Config::new(path)
            .builder(Runtime::Tokio1)
            .map_err(|e| DatabaseError::configuration(format!("Invalid SQLite config: {}", e)))?
            .max_size(max_size)
            .wait_timeout(Some(config.acquire_timeout))
            .build()
            .map_err(|e| DatabaseError::configuration(format!("Failed to create pool: {}", e)))?;

        let driver = Self {
            pool,
            acquire_timeout: config.acquire_timeout,
        };

        let mut conn = driver.acquire().await?;
        conn.interact(|conn| {
            // journal_mode returns the resulting mode as a row
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::connection_with_source("Failed to initialize database", e))?;

        debug!(path, max_size, "SQLite pool ready");
        Ok(driver)
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn acquire(&self) -> Result<SqliteConnection> {
        let object = self.pool.get().await.map_err(|e| self.map_pool_error(e))?;
        let mut conn = SqliteConnection {
            object: Some(object),
            discarded: false,
        };

        let busy_timeout = self.acquire_timeout;
        conn.interact(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::connection_with_source("Failed to prepare connection", e))?;

        Ok(conn)
    }
}

/// Pooled SQLite connection
pub struct SqliteConnection {
    object: Option<Object>,
    discarded: bool,
}

impl SqliteConnection {
    /// Run `f` on the blocking pool with the underlying rusqlite connection
    async fn interact<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let object = self
            .object
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Connection already released"))?;

        match object.interact(f).await {
            Ok(result) => result,
            Err(e) => {
                // The closure panicked or was aborted; the connection state is unknown
                self.discarded = true;
                Err(DatabaseError::other(format!("Interact error: {}", e)))
            }
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&mut self, sql: &str, params: &Parameters) -> Result<RawResultSet> {
        let sql = sql.to_string();
        let params = params.clone();

        self.interact(move |conn| {
            let mut batch = Batch::new(conn, &sql);
            let Some(mut stmt) = batch.next()? else {
                return Err(DatabaseError::invalid_input("statement text is empty"));
            };
            // Refused before any statement runs
            if batch.next()?.is_some() {
                return Err(DatabaseError::unsupported(
                    "statement text holds more than one statement; use fetch_multi_table",
                ));
            }
            let values = bind_parameters(&stmt, &params)?;
            read_result_set(&mut stmt, &values)
        })
        .await
    }

    async fn query_multiple(
        &mut self,
        sql: &str,
        params: &Parameters,
    ) -> Result<Vec<RawResultSet>> {
        let sql = sql.to_string();
        let params = params.clone();

        self.interact(move |conn| {
            let mut batch = Batch::new(conn, &sql);
            let mut results = Vec::new();
            while let Some(mut stmt) = batch.next()? {
                let values = bind_parameters(&stmt, &params)?;
                if stmt.column_count() == 0 {
                    stmt.execute(params_from_iter(values.iter().map(value_to_param)))?;
                    continue;
                }
                results.push(read_result_set(&mut stmt, &values)?);
            }
            Ok(results)
        })
        .await
    }

    async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        let sql = sql.to_string();
        let params = params.clone();

        self.interact(move |conn| {
            let conn: &rusqlite::Connection = conn;
            let mut batch = Batch::new(conn, &sql);
            let mut affected = 0u64;

            while let Some(mut stmt) = batch.next()? {
                let values = bind_parameters(&stmt, &params)?;
                let bound = params_from_iter(values.iter().map(value_to_param));

                if stmt.column_count() == 0 {
                    affected += stmt.execute(bound)? as u64;
                    continue;
                }

                // RETURNING clauses and the like: drain, then count the changes
                let readonly = stmt.readonly();
                let mut rows = stmt.query(bound)?;
                while rows.next()?.is_some() {}
                drop(rows);
                if !readonly {
                    affected += conn.changes() as u64;
                }
            }
            Ok(affected)
        })
        .await
    }

    async fn begin(&mut self) -> Result<()> {
        self.interact(|conn| Ok(conn.execute_batch("BEGIN IMMEDIATE")?))
            .await
    }

    async fn commit(&mut self) -> Result<()> {
        self.interact(|conn| Ok(conn.execute_batch("COMMIT")?)).await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.interact(|conn| Ok(conn.execute_batch("ROLLBACK")?))
            .await
    }

    fn discard(&mut self) {
        self.discarded = true;
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.discarded {
            return;
        }
        if let Some(object) = self.object.take() {
            error!("Discarding SQLite connection");
            // Detach from the pool; closing the connection rolls back any open transaction
            drop(Object::take(object));
        }
    }
}

/// Values for every placeholder of `stmt`, in placeholder order
fn bind_parameters(stmt: &Statement<'_>, params: &Parameters) -> Result<Vec<DatabaseValue>> {
    (1..=stmt.parameter_count())
        .map(|index| {
            let name = match stmt.parameter_name(index) {
                Some(name) if !name.starts_with('?') => name.to_string(),
                _ => format!("{}{}", GENERATED_PARAMETER_PREFIX, index),
            };
            params
                .get(&name)
                .cloned()
                .ok_or(DatabaseError::MissingParameter(name))
        })
        .collect()
}

/// Run a bound statement and collect every row
fn read_result_set(stmt: &mut Statement<'_>, values: &[DatabaseValue]) -> Result<RawResultSet> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(values.iter().map(value_to_param)))?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(value_from_ref(row.get_ref(i)?));
        }
        collected.push(cells);
    }

    Ok(RawResultSet::new(columns, collected))
}

fn value_from_ref(value: ValueRef<'_>) -> DatabaseValue {
    match value {
        ValueRef::Null => DatabaseValue::Null,
        ValueRef::Integer(v) => DatabaseValue::Long(v),
        ValueRef::Real(v) => DatabaseValue::Double(v),
        ValueRef::Text(v) => match std::str::from_utf8(v) {
            Ok(text) => DatabaseValue::String(text.to_string()),
            // TEXT is not checked on the way in; keep the bytes as stored
            Err(_) => DatabaseValue::Bytes(v.to_vec()),
        },
        ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
    }
}

/// Convert DatabaseValue to rusqlite parameter
///
/// Decimals and dates are stored as text, dates in ISO-8601.
fn value_to_param(value: &DatabaseValue) -> Box<dyn ToSql> {
    match value {
        DatabaseValue::Null => Box::new(None::<i64>),
        DatabaseValue::Bool(v) => Box::new(*v),
        DatabaseValue::Int(v) => Box::new(*v),
        DatabaseValue::Long(v) => Box::new(*v),
        DatabaseValue::Float(v) => Box::new(f64::from(*v)),
        DatabaseValue::Double(v) => Box::new(*v),
        DatabaseValue::Decimal(v) | DatabaseValue::String(v) => Box::new(v.clone()),
        DatabaseValue::Bytes(v) => Box::new(v.clone()),
        DatabaseValue::Date(_)
        | DatabaseValue::Time(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::TimestampTz(_) => Box::new(value.as_string()),
    }
}
