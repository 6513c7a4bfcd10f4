//! Core data-access types and traits
//!
//! This module provides the driver-independent building blocks: errors, cell
//! values, parameters, statement batches, tabular results and their
//! projections, and the repository itself.

pub mod blocking;
pub mod config;
pub mod database_types;
pub mod driver;
pub mod error;
pub mod json;
pub mod parameters;
pub mod projector;
pub mod query_pattern;
pub mod repository;
pub mod table;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use blocking::BlockingRepository;
pub use config::{ConnectionBuilder, RepositoryConfig};
pub use database_types::DatabaseType;
pub use driver::{Connection, Driver};
pub use error::{DatabaseError, Result};
pub use json::{multi_table_to_json, table_to_json};
pub use parameters::{build_parameter_map, Parameters};
pub use query_pattern::{build_query_pattern, QueryPattern};
pub use repository::{DataRepository, Repository};
pub use table::{MultiTabularResult, RawResultSet, Row, TabularResult};
pub use transaction::TransactionGuard;
pub use value::{DatabaseValue, FromDatabaseValue};
