//! Repository configuration
//!
//! A [`RepositoryConfig`] is built once, validated, and then owned immutably
//! by the repository and its driver.

use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use std::time::Duration;

/// Default timeout for a whole repository operation (30 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for waiting on a pooled connection (5 seconds)
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum number of pooled connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Connection and timeout settings of a repository
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Driver connection string (SQLite path or PostgreSQL key/value string)
    pub connection_string: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,
    /// Timeout for a whole operation, including connection acquisition
    pub operation_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl RepositoryConfig {
    /// Create a configuration for `connection_string` with default limits
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set maximum pool size
    pub fn with_max_connections(mut self, size: usize) -> Self {
        self.max_connections = size;
        self
    }

    /// Set connection acquisition timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check the settings before a driver is built from them
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] for an empty connection
    /// string, a zero pool size or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(DatabaseError::configuration(
                "connection string must not be empty",
            ));
        }
        if self.max_connections == 0 {
            return Err(DatabaseError::configuration(
                "max_connections must be at least 1",
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(DatabaseError::configuration(
                "acquire_timeout must be greater than zero",
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(DatabaseError::configuration(
                "operation_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Operation timeout in whole milliseconds, as reported in timeout errors
    pub(crate) fn operation_timeout_ms(&self) -> u64 {
        self.operation_timeout.as_millis() as u64
    }
}

/// Connection string builder
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    db_type: DatabaseType,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    options: Vec<(String, String)>,
}

impl ConnectionBuilder {
    /// Create a new connection builder for the specified database type
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            options: Vec::new(),
        }
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name (the file path for SQLite)
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a custom option, emitted after the standard keys in insertion order
    pub fn option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        match self.db_type {
            DatabaseType::Sqlite => self
                .database
                .clone()
                .unwrap_or_else(|| ":memory:".to_string()),
            DatabaseType::Postgres => {
                let mut parts = Vec::new();
                if let Some(host) = &self.host {
                    parts.push(format!("host={}", quote_value(host)));
                }
                if let Some(port) = self.port {
                    parts.push(format!("port={}", port));
                }
                if let Some(database) = &self.database {
                    parts.push(format!("dbname={}", quote_value(database)));
                }
                if let Some(username) = &self.username {
                    parts.push(format!("user={}", quote_value(username)));
                }
                if let Some(password) = &self.password {
                    parts.push(format!("password={}", quote_value(password)));
                }
                for (key, value) in &self.options {
                    parts.push(format!("{}={}", key, quote_value(value)));
                }
                parts.join(" ")
            }
            DatabaseType::None => String::new(),
        }
    }

    /// Build a [`RepositoryConfig`] with default limits for this connection
    pub fn build_config(&self) -> RepositoryConfig {
        RepositoryConfig::new(self.build_connection_string())
    }
}

/// Quote a key/value connection string value when it needs it
fn quote_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\') {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
