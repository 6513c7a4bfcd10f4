//! Database backend implementations
//!
//! This module contains pooled implementations of the [`Driver`](crate::core::Driver)
//! trait for the supported database systems.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub use sqlite::{PoolStats, SqliteConnection, SqliteDriver, SqliteRepository};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresDriver, PostgresRepository};
