//! Repository
//!
//! [`DataRepository`] is the driver-independent data-access contract;
//! [`Repository`] implements it over any [`Driver`].

use super::config::RepositoryConfig;
use super::database_types::DatabaseType;
use super::driver::{Connection, Driver};
use super::error::{DatabaseError, Result};
use super::parameters::Parameters;
use super::projector::{project_multi_table, project_row, project_table, scalar_from_row};
use super::query_pattern::QueryPattern;
use super::table::{MultiTabularResult, RawResultSet, Row, TabularResult};
use super::transaction::TransactionGuard;
use super::value::FromDatabaseValue;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Data-access operations
///
/// Every call acquires its own connection and releases it before returning;
/// results never reference driver resources.
#[async_trait]
pub trait DataRepository: Send + Sync {
    /// First row of the result, `None` if there are no rows
    async fn fetch_row(&self, query: &str, params: Option<&Parameters>) -> Result<Option<Row>>;

    /// Full result as a table; zero rows yield an empty table with its columns
    async fn fetch_table(&self, query: &str, params: Option<&Parameters>)
        -> Result<TabularResult>;

    /// One table per result set, named `Table`, `Table1`, ... in execution order
    async fn fetch_multi_table(
        &self,
        query: &str,
        params: Option<&Parameters>,
    ) -> Result<MultiTabularResult>;

    /// Apply `patterns` atomically
    ///
    /// All statements run on one connection inside one transaction, in order;
    /// each parameter map of a pattern is one execution. Returns `true` once
    /// everything is committed. On the first failure the transaction is
    /// rolled back and the error names the index of the failing pattern.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Connection`] if no connection or transaction can be had
    /// - [`DatabaseError::StatementExecution`] for the first failing statement
    /// - [`DatabaseError::Rollback`] if the rollback after a failure failed too
    /// - [`DatabaseError::Transaction`] if the commit failed
    async fn save_changes(&self, patterns: &[QueryPattern]) -> Result<bool>;

    /// First column of the first row converted to `T`
    ///
    /// No rows and a `NULL` cell both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::TypeConversion`] if the cell does not convert
    async fn fetch_scalar<T>(&self, query: &str, params: Option<&Parameters>) -> Result<Option<T>>
    where
        T: FromDatabaseValue + Send,
    {
        match self.fetch_row(query, params).await? {
            Some(row) => scalar_from_row(&row),
            None => Ok(None),
        }
    }
}

/// Repository over a pooled [`Driver`]
///
/// Holds only its immutable configuration and the driver's pool handle, so it
/// is cheap to clone and safe to share between concurrent tasks.
///
/// # Example
///
/// ```no_run
/// use rust_data_repository::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let repo = SqliteRepository::connect(RepositoryConfig::new("points.db")).await?;
///
/// let table = repo
///     .fetch_table(
///         "SELECT name, value FROM points WHERE site = @site",
///         Some(&Parameters::new().with("@site", "north")),
///     )
///     .await?;
/// println!("{}", table.to_json()?);
/// # Ok(())
/// # }
/// ```
pub struct Repository<D: Driver> {
    driver: Arc<D>,
    config: Arc<RepositoryConfig>,
}

impl<D: Driver> Clone for Repository<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Repository<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("database_type", &self.driver.database_type())
            .field("config", &self.config)
            .finish()
    }
}

impl<D: Driver> Repository<D> {
    /// Wrap an existing driver
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] if `config` does not validate
    pub fn new(driver: D, config: RepositoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            driver: Arc::new(driver),
            config: Arc::new(config),
        })
    }

    /// Validate `config`, build its driver and wrap it
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] for an invalid configuration
    /// and [`DatabaseError::Connection`] if the database cannot be reached
    pub async fn connect(config: RepositoryConfig) -> Result<Self> {
        config.validate()?;
        let driver = D::connect(&config).await?;
        debug!(
            database = %driver.database_type(),
            max_connections = config.max_connections,
            "Repository connected"
        );
        Self::new(driver, config)
    }

    /// Get the configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Get the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the database type
    pub fn database_type(&self) -> DatabaseType {
        self.driver.database_type()
    }

    /// Run `operation` under the operation timeout
    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.config.operation_timeout, fut)
            .await
            .map_err(|_| {
                warn!(
                    operation,
                    timeout_ms = self.config.operation_timeout_ms(),
                    "Operation timed out"
                );
                DatabaseError::query_timeout(self.config.operation_timeout_ms())
            })?;
        debug!(
            operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Operation finished"
        );
        result
    }

    async fn read_one(&self, query: &str, params: Option<&Parameters>) -> Result<RawResultSet> {
        let empty = Parameters::new();
        let params = params.unwrap_or(&empty);
        debug!(sql = %query, params = params.len(), "Executing query");

        let mut conn = self.driver.acquire().await?;
        conn.query(query, params)
            .await
            .map_err(|e| read_failure(query, e))
    }

    async fn read_all(
        &self,
        query: &str,
        params: Option<&Parameters>,
    ) -> Result<Vec<RawResultSet>> {
        let empty = Parameters::new();
        let params = params.unwrap_or(&empty);
        debug!(sql = %query, params = params.len(), "Executing multi-result query");

        let mut conn = self.driver.acquire().await?;
        conn.query_multiple(query, params)
            .await
            .map_err(|e| read_failure(query, e))
    }

    async fn apply(&self, patterns: &[QueryPattern]) -> Result<bool> {
        let mut conn = self.driver.acquire().await?;
        let mut tx = TransactionGuard::begin(&mut conn).await?;

        for (index, pattern) in patterns.iter().enumerate() {
            if let Err(cause) = execute_pattern(&mut tx, pattern).await {
                let err = DatabaseError::statement_execution(index, pattern.statement(), cause);
                warn!(index, sql = %pattern.statement(), error = %err, "Statement failed, rolling back");

                return Err(match tx.rollback().await {
                    Ok(()) => err,
                    Err(rollback) => {
                        error!(index, error = %rollback, "Rollback failed");
                        DatabaseError::rollback_failed(err, rollback)
                    }
                });
            }
        }

        tx.commit().await?;
        Ok(true)
    }
}

/// Run every execution of one pattern, each binding only its own map
async fn execute_pattern<C: Connection + ?Sized>(
    tx: &mut TransactionGuard<'_, C>,
    pattern: &QueryPattern,
) -> Result<()> {
    if pattern.parameter_sets().is_empty() {
        tx.execute(pattern.statement(), &Parameters::new()).await?;
        return Ok(());
    }
    for params in pattern.parameter_sets() {
        let affected = tx.execute(pattern.statement(), params).await?;
        debug!(sql = %pattern.statement(), affected, "Statement executed");
    }
    Ok(())
}

/// Attach the statement to a driver failure; connection and caller errors
/// pass through unchanged
fn read_failure(query: &str, err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::Connection { .. }
        | DatabaseError::ConnectionTimeout { .. }
        | DatabaseError::QueryTimeout { .. }
        | DatabaseError::MissingParameter(_)
        | DatabaseError::InvalidInput(_)
        | DatabaseError::TypeConversion { .. }
        | DatabaseError::DataAccess { .. } => err,
        other => DatabaseError::data_access(query, other),
    }
}

#[async_trait]
impl<D: Driver> DataRepository for Repository<D> {
    async fn fetch_row(&self, query: &str, params: Option<&Parameters>) -> Result<Option<Row>> {
        self.timed("fetch_row", async {
            project_row(self.read_one(query, params).await?)
        })
        .await
    }

    async fn fetch_table(
        &self,
        query: &str,
        params: Option<&Parameters>,
    ) -> Result<TabularResult> {
        self.timed("fetch_table", async {
            project_table(self.read_one(query, params).await?)
        })
        .await
    }

    async fn fetch_multi_table(
        &self,
        query: &str,
        params: Option<&Parameters>,
    ) -> Result<MultiTabularResult> {
        self.timed("fetch_multi_table", async {
            project_multi_table(self.read_all(query, params).await?)
        })
        .await
    }

    async fn save_changes(&self, patterns: &[QueryPattern]) -> Result<bool> {
        let executions: usize = patterns.iter().map(QueryPattern::execution_count).sum();
        debug!(patterns = patterns.len(), executions, "Saving changes");

        self.timed("save_changes", self.apply(patterns)).await
    }
}
