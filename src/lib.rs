//! # Rust Data Repository
//!
//! A generic data-access layer over pooled SQL drivers. Callers hand it SQL
//! text and named parameters; it returns driver-independent tables, rows and
//! scalars, projects them to JSON, and applies batches of parameterized
//! statements atomically.
//!
//! ## Features
//!
//! - **Named Parameters**: `@name` placeholders bound from an ordered map
//! - **Tabular Results**: rows keyed by unique column names, zero-row tables keep their columns
//! - **Multiple Result Sets**: named `Table`, `Table1`, ... in execution order
//! - **JSON Projection**: column order preserved, binary as base64, dates as ISO-8601
//! - **Atomic Batches**: one transaction per `save_changes`, rolled back on the first failure
//! - **Connection Pooling**: deadpool-backed, safe for concurrent callers
//! - **Blocking Facade**: the same contract for synchronous code
//!
//! ## Supported Databases
//!
//! | Database | Feature | Pool |
//! |----------|---------|------|
//! | SQLite | `sqlite` (default) | deadpool-sqlite |
//! | PostgreSQL | `postgres` | deadpool-postgres |
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rust_data_repository = { version = "0.1", features = ["sqlite"] }
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ### Reading
//!
//! ```rust,no_run
//! use rust_data_repository::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let repo = SqliteRepository::connect(RepositoryConfig::new("points.db")).await?;
//!
//!     let count: Option<i64> = repo.fetch_scalar("SELECT COUNT(*) FROM points", None).await?;
//!     println!("{} points", count.unwrap_or(0));
//!
//!     let table = repo
//!         .fetch_table(
//!             "SELECT name, value FROM points WHERE value > @param1",
//!             Some(&build_parameter_map([10])),
//!         )
//!         .await?;
//!     println!("{}", table.to_json()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Writing
//!
//! ```rust,no_run
//! use rust_data_repository::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let repo = SqliteRepository::connect(RepositoryConfig::new("points.db")).await?;
//!
//!     let insert = QueryPattern::new("INSERT INTO points (name, value) VALUES (@name, @value)")?
//!         .with_parameters([("@name", "P1"), ("@value", "1.5")])
//!         .with_parameters([("@name", "P2"), ("@value", "2.5")]);
//!     let delete = build_query_pattern("DELETE FROM points WHERE name = @name", [("@name", "P0")])?;
//!
//!     // Both patterns commit together or not at all
//!     repo.save_changes(&[insert, delete]).await?;
//!
//!     Ok(())
//! }
//! ```

/// Core data-access types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_data_repository::prelude::*;
///
/// let params = Parameters::new().with("@id", 7);
/// assert_eq!(params.get("id"), Some(&DatabaseValue::Int(7)));
/// ```
pub mod prelude {
    pub use crate::core::{
        build_parameter_map, build_query_pattern, BlockingRepository, DataRepository,
        DatabaseError, DatabaseType, DatabaseValue, FromDatabaseValue, MultiTabularResult,
        Parameters, QueryPattern, Repository, RepositoryConfig, Result, Row, TabularResult,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteRepository;

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresRepository;
}

// Re-export at root level for convenience
pub use crate::core::{
    build_parameter_map, build_query_pattern, BlockingRepository, ConnectionBuilder,
    DataRepository, DatabaseError, DatabaseType, DatabaseValue, MultiTabularResult, Parameters,
    QueryPattern, Repository, RepositoryConfig, Result, Row, TabularResult,
};

#[cfg(feature = "sqlite")]
pub use crate::backends::SqliteRepository;

#[cfg(feature = "postgres")]
pub use crate::backends::PostgresRepository;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let db_type = DatabaseType::Sqlite;
        assert_eq!(db_type.to_str(), "sqlite");

        let pattern = build_query_pattern("DELETE FROM t WHERE id = @id", [("@id", 1)]).unwrap();
        assert_eq!(pattern.execution_count(), 1);
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: DatabaseValue = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: DatabaseValue = "test".into();
        assert_eq!(val.as_string(), "test");

        let val: DatabaseValue = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }
}
