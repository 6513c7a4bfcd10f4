//! Transaction guard
//!
//! This module provides RAII-style transaction management on one borrowed
//! connection.

use super::driver::Connection;
use super::error::{DatabaseError, Result};
use super::parameters::Parameters;
use tracing::{error, warn};

/// Transaction on a single connection, discarded on drop if still open
///
/// Every statement of the transaction runs on the borrowed connection. If the
/// guard is dropped without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback), for example because the surrounding future
/// was cancelled by a timeout, the connection is discarded: the database
/// rolls the transaction back when the physical connection closes, and the
/// pool never hands out a connection with an open transaction.
///
/// # Example
///
/// ```ignore
/// let mut conn = driver.acquire().await?;
/// let mut tx = TransactionGuard::begin(&mut conn).await?;
///
/// tx.execute("UPDATE accounts SET balance = balance - 100 WHERE id = @id", &params).await?;
///
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    finished: bool,
}

impl<'c, C: Connection + ?Sized> TransactionGuard<'c, C> {
    /// Begin a new transaction on `conn`
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Connection`] if the transaction cannot be
    /// started; timeouts are passed through unchanged
    pub async fn begin(conn: &'c mut C) -> Result<Self> {
        if let Err(e) = conn.begin().await {
            return Err(match e {
                DatabaseError::Connection { .. }
                | DatabaseError::ConnectionTimeout { .. }
                | DatabaseError::QueryTimeout { .. } => e,
                other => DatabaseError::connection_with_source("Failed to begin transaction", other),
            });
        }

        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Execute a parameterized statement within the transaction
    ///
    /// # Errors
    ///
    /// Returns the driver error if the statement fails
    pub async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        self.conn.execute(sql, params).await
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Transaction`] if the commit fails; the
    /// connection is then discarded
    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.commit().await {
            error!(error = %e, "Commit failed, discarding connection");
            self.conn.discard();
            return Err(DatabaseError::transaction_with_source(
                "Failed to commit transaction",
                e,
            ));
        }
        Ok(())
    }

    /// Roll the transaction back
    ///
    /// # Errors
    ///
    /// Returns the driver error if the rollback fails; the connection is
    /// then discarded
    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.rollback().await {
            error!(error = %e, "Rollback failed, discarding connection");
            self.conn.discard();
            return Err(e);
        }
        Ok(())
    }
}

impl<C: Connection + ?Sized> Drop for TransactionGuard<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction dropped while open, discarding connection");
            self.conn.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::RawResultSet;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingConnection {
        log: Vec<&'static str>,
        fail_commit: bool,
        discarded: bool,
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn query(&mut self, _sql: &str, _params: &Parameters) -> Result<RawResultSet> {
            Ok(RawResultSet::default())
        }

        async fn query_multiple(
            &mut self,
            _sql: &str,
            _params: &Parameters,
        ) -> Result<Vec<RawResultSet>> {
            Ok(Vec::new())
        }

        async fn execute(&mut self, _sql: &str, _params: &Parameters) -> Result<u64> {
            self.log.push("execute");
            Ok(1)
        }

        async fn begin(&mut self) -> Result<()> {
            self.log.push("begin");
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            self.log.push("commit");
            if self.fail_commit {
                return Err(DatabaseError::other("disk full"));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.log.push("rollback");
            Ok(())
        }

        fn discard(&mut self) {
            self.discarded = true;
        }
    }

    #[tokio::test]
    async fn test_transaction_guard_commit() {
        let mut conn = RecordingConnection::default();
        {
            let mut tx = TransactionGuard::begin(&mut conn).await.unwrap();
            tx.execute("INSERT INTO t VALUES (1)", &Parameters::new())
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(conn.log, vec!["begin", "execute", "commit"]);
        assert!(!conn.discarded);
    }

    #[tokio::test]
    async fn test_transaction_guard_explicit_rollback() {
        let mut conn = RecordingConnection::default();
        {
            let tx = TransactionGuard::begin(&mut conn).await.unwrap();
            tx.rollback().await.unwrap();
        }

        assert_eq!(conn.log, vec!["begin", "rollback"]);
        assert!(!conn.discarded);
    }

    #[tokio::test]
    async fn test_transaction_guard_drop_discards_connection() {
        let mut conn = RecordingConnection::default();
        {
            let _tx = TransactionGuard::begin(&mut conn).await.unwrap();
        }

        assert_eq!(conn.log, vec!["begin"]);
        assert!(conn.discarded);
    }

    #[tokio::test]
    async fn test_failed_commit_discards_connection() {
        let mut conn = RecordingConnection {
            fail_commit: true,
            ..Default::default()
        };
        let err = {
            let tx = TransactionGuard::begin(&mut conn).await.unwrap();
            tx.commit().await.unwrap_err()
        };

        assert!(matches!(err, DatabaseError::Transaction { .. }));
        assert!(conn.discarded);
    }
}
