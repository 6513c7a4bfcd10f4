//! Driver contract
//!
//! This module defines the traits a database binding implements to back a
//! [`Repository`](super::repository::Repository). A [`Driver`] hands out pooled
//! connections; a [`Connection`] executes statements with named parameters and
//! returns raw result sets.

use super::config::RepositoryConfig;
use super::database_types::DatabaseType;
use super::error::Result;
use super::parameters::Parameters;
use super::table::RawResultSet;
use async_trait::async_trait;

/// Connection factory backing a repository
///
/// Implementations are pool handles: cheap to share across tasks and safe to
/// call concurrently.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Connection type handed out by [`acquire`](Self::acquire)
    type Connection: Connection;

    /// Build a driver from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`](super::DatabaseError::Configuration)
    /// for an unusable connection string and
    /// [`DatabaseError::Connection`](super::DatabaseError::Connection) if the
    /// database cannot be reached
    async fn connect(config: &RepositoryConfig) -> Result<Self>
    where
        Self: Sized;

    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Take a connection from the pool
    ///
    /// The connection goes back to the pool when dropped, unless it was
    /// [discarded](Connection::discard).
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConnectionTimeout`](super::DatabaseError::ConnectionTimeout)
    /// if no connection became available in time, otherwise
    /// [`DatabaseError::Connection`](super::DatabaseError::Connection)
    async fn acquire(&self) -> Result<Self::Connection>;
}

/// One physical connection, exclusively borrowed for one operation
#[async_trait]
pub trait Connection: Send {
    /// Run a statement and return its first result set
    ///
    /// Column names are reported even when no row matches.
    async fn query(&mut self, sql: &str, params: &Parameters) -> Result<RawResultSet>;

    /// Run a statement text that may hold several statements and return every
    /// result set, in order
    ///
    /// Statements that produce no result set run but contribute nothing.
    async fn query_multiple(&mut self, sql: &str, params: &Parameters)
        -> Result<Vec<RawResultSet>>;

    /// Run a statement as a non-query and return the number of affected rows
    ///
    /// Rows the statement returns are read and thrown away.
    async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64>;

    /// Start a transaction
    async fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Close the physical connection instead of returning it to the pool
    fn discard(&mut self);
}
