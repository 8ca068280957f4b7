use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Executor;
use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::ResultSet;
use crate::source::PooledConn;

/// Executor pinned to the single connection of one in-flight transaction.
///
/// Clones share the connection. Calls are serialized on it in the order they lock it, so
/// two queries never run on the pinned connection at the same time. Once the transaction
/// finishes, every call fails with `SqlEzError::ConnectionError`.
#[derive(Clone)]
pub struct TransactionExecutor {
    slot: Arc<Mutex<Option<PooledConn>>>,
}

/// What a transaction's work function receives.
pub type TransactionContext = TransactionExecutor;

impl TransactionExecutor {
    pub(crate) fn pin(conn: PooledConn) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Issue parameterless SQL on the pinned connection.
    pub(crate) async fn batch_execute(&self, sql: &str) -> Result<(), SqlEzError> {
        let mut guard = self.slot.lock().await;
        let conn = guard.as_mut().ok_or_else(inactive)?;
        conn.batch_execute(sql).await
    }

    /// Take the connection back once no query holds it.
    pub(crate) async fn unpin(&self) -> Option<PooledConn> {
        self.slot.lock().await.take()
    }

    /// Non-blocking variant of [`TransactionExecutor::unpin`] for use from `Drop`.
    pub(crate) fn try_unpin(&self) -> Option<PooledConn> {
        self.slot.try_lock().ok().and_then(|mut guard| guard.take())
    }

    /// True while the transaction still owns its connection.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

impl std::fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor").finish_non_exhaustive()
    }
}

fn inactive() -> SqlEzError {
    SqlEzError::ConnectionError("transaction is no longer active".to_string())
}

#[async_trait]
impl Executor for TransactionExecutor {
    async fn run(&self, request: QueryRequest) -> Result<ResultSet, SqlEzError> {
        request.validate()?;
        let mut guard = self.slot.lock().await;
        let conn = guard.as_mut().ok_or_else(inactive)?;
        conn.query(&request).await
    }
}
