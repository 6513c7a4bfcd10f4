//! Database type definitions
//!
//! This module defines the database engines a repository can be bound to.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum DatabaseType {
    /// No database type specified
    #[default]
    None = 0,
    /// PostgreSQL database
    Postgres = 1,
    /// SQLite database
    Sqlite = 3,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::None => "none",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(DatabaseType::None),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_to_str() {
        assert_eq!(DatabaseType::Postgres.to_str(), "postgres");
        assert_eq!(DatabaseType::Sqlite.to_str(), "sqlite");
        assert_eq!(DatabaseType::default().to_str(), "none");
    }

    #[test]
    fn test_database_type_from_str() {
        assert_eq!(
            "postgresql".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Postgres)
        );
        assert_eq!("PG".parse::<DatabaseType>().ok(), Some(DatabaseType::Postgres));
        assert_eq!(
            "sqlite3".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Sqlite)
        );
        assert_eq!("mysql".parse::<DatabaseType>().ok(), None);
    }
}
