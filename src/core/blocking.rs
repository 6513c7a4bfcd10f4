//! Synchronous repository
//!
//! [`BlockingRepository`] drives any [`DataRepository`] on a private
//! current-thread runtime, for callers that are not async themselves.

use super::config::RepositoryConfig;
use super::driver::Driver;
use super::error::{DatabaseError, Result};
use super::parameters::Parameters;
use super::query_pattern::QueryPattern;
use super::repository::{DataRepository, Repository};
use super::table::{MultiTabularResult, Row, TabularResult};
use super::value::FromDatabaseValue;
use tokio::runtime::{Builder, Runtime};

/// Blocking wrapper with the same contract as the async repository
///
/// # Panics
///
/// Every method blocks on the internal runtime and panics if called from
/// within an async context.
pub struct BlockingRepository<R: DataRepository> {
    inner: R,
    runtime: Runtime,
}

impl<D: Driver> BlockingRepository<Repository<D>> {
    /// Validate `config`, build its driver and wrap it
    ///
    /// # Errors
    ///
    /// Same as [`Repository::connect`], plus [`DatabaseError::Other`] if the
    /// runtime cannot be started
    pub fn connect(config: RepositoryConfig) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = runtime.block_on(Repository::connect(config))?;
        Ok(Self { inner, runtime })
    }
}

impl<R: DataRepository> BlockingRepository<R> {
    /// Wrap an async repository
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if the runtime cannot be started
    pub fn new(inner: R) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: build_runtime()?,
        })
    }

    /// The wrapped async repository
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// See [`DataRepository::fetch_scalar`]
    pub fn fetch_scalar<T>(&self, query: &str, params: Option<&Parameters>) -> Result<Option<T>>
    where
        T: FromDatabaseValue + Send,
    {
        self.runtime.block_on(self.inner.fetch_scalar(query, params))
    }

    /// See [`DataRepository::fetch_row`]
    pub fn fetch_row(&self, query: &str, params: Option<&Parameters>) -> Result<Option<Row>> {
        self.runtime.block_on(self.inner.fetch_row(query, params))
    }

    /// See [`DataRepository::fetch_table`]
    pub fn fetch_table(&self, query: &str, params: Option<&Parameters>) -> Result<TabularResult> {
        self.runtime.block_on(self.inner.fetch_table(query, params))
    }

    /// See [`DataRepository::fetch_multi_table`]
    pub fn fetch_multi_table(
        &self,
        query: &str,
        params: Option<&Parameters>,
    ) -> Result<MultiTabularResult> {
        self.runtime
            .block_on(self.inner.fetch_multi_table(query, params))
    }

    /// See [`DataRepository::save_changes`]
    pub fn save_changes(&self, patterns: &[QueryPattern]) -> Result<bool> {
        self.runtime.block_on(self.inner.save_changes(patterns))
    }
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DatabaseError::other(format!("Failed to start runtime: {}", e)))
}
