//! Scoped transactions: BEGIN, caller work, then COMMIT or ROLLBACK on one pinned connection.
//!
//! ```rust,no_run
//! use sql_ez::prelude::*;
//!
//! # async fn demo(db: SqlEz) -> Result<(), SqlEzError> {
//! db.transaction(|tx| async move {
//!     tx.exec(("INSERT INTO web_user VALUES ($1, $2)", vec![1.into(), "Peter_Gibbons".into()]))
//!         .await?;
//!     tx.exec(("INSERT INTO web_user_permission VALUES ($1, $2)", vec![1.into(), "app:data:update".into()]))
//!         .await?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(()) }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::error::SqlEzError;
use crate::executor::{TransactionContext, TransactionExecutor};
use crate::source::{ConnectionSource, PooledConn};

/// Where one transaction invocation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    Idle,
    Connecting,
    Began,
    Running,
    Committing,
    RollingBack,
    Done,
    Failed,
}

impl TxState {
    /// Whether `self -> next` is an edge of the transaction protocol.
    #[must_use]
    pub fn can_advance_to(self, next: TxState) -> bool {
        use TxState::{Began, Committing, Connecting, Done, Failed, Idle, RollingBack, Running};
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Began | Failed)
                | (Began, Running | RollingBack)
                | (Running, Committing | RollingBack)
                | (Committing, Done | RollingBack)
                | (RollingBack, Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Done | TxState::Failed)
    }
}

/// Tracks the state of one invocation and rejects edges the protocol does not have.
#[derive(Debug)]
struct TxMachine {
    state: TxState,
}

impl TxMachine {
    fn new() -> Self {
        Self {
            state: TxState::Idle,
        }
    }

    fn advance(&mut self, next: TxState) -> Result<(), SqlEzError> {
        if !self.state.can_advance_to(next) {
            return Err(SqlEzError::Other(format!(
                "invalid transaction transition {:?} -> {next:?}",
                self.state
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "transaction state");
        self.state = next;
        Ok(())
    }
}

/// Rolls back and releases the pinned connection if the coordinator is dropped mid-flight.
struct PinnedGuard {
    ctx: TransactionExecutor,
    armed: bool,
}

impl PinnedGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PinnedGuard {
    fn drop(&mut self) {
        if self.armed
            && let Some(mut conn) = self.ctx.try_unpin()
            && let Ok(handle) = Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(e) = conn.batch_execute("ROLLBACK").await {
                    tracing::warn!(error = %e, "rollback of abandoned transaction failed");
                }
                conn.release();
            });
        }
    }
}

/// Runs caller work inside BEGIN / COMMIT, rolling back on any failure.
///
/// Exactly one BEGIN and exactly one of COMMIT or ROLLBACK are issued per invocation, and the
/// connection is released exactly once on every path.
#[derive(Clone)]
pub struct TransactionCoordinator {
    source: Arc<dyn ConnectionSource>,
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self { source }
    }

    /// Run `work` in a transaction and return its value once committed.
    ///
    /// `work` gets a [`TransactionContext`]; every query issued through it runs on the
    /// pinned connection. The coordinator waits for `work` to finish, and for any query
    /// still holding the connection, before committing.
    ///
    /// # Errors
    /// Returns the first failure: acquisition, BEGIN, the work's own error, or COMMIT. A
    /// ROLLBACK failure is logged and never replaces that first failure.
    pub async fn run<F, Fut, T>(&self, work: F) -> Result<T, SqlEzError>
    where
        F: FnOnce(TransactionContext) -> Fut + Send,
        Fut: Future<Output = Result<T, SqlEzError>> + Send,
        T: Send,
    {
        let mut machine = TxMachine::new();
        machine.advance(TxState::Connecting)?;

        let conn = match self.source.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                machine.advance(TxState::Failed)?;
                return Err(e);
            }
        };

        let ctx = TransactionExecutor::pin(conn);
        let mut guard = PinnedGuard {
            ctx: ctx.clone(),
            armed: true,
        };

        let begun = ctx.batch_execute("BEGIN").await;
        machine.advance(TxState::Began)?;

        let outcome = match begun {
            Ok(()) => {
                machine.advance(TxState::Running)?;
                work(ctx.clone()).await
            }
            Err(e) => Err(e),
        };

        let Some(mut conn) = ctx.unpin().await else {
            guard.disarm();
            return Err(SqlEzError::ConnectionError(
                "transaction connection went missing".to_string(),
            ));
        };
        guard.disarm();

        let result = match outcome {
            Ok(value) => {
                machine.advance(TxState::Committing)?;
                match conn.batch_execute("COMMIT").await {
                    Ok(()) => {
                        machine.advance(TxState::Done)?;
                        Ok(value)
                    }
                    Err(e) => Err(Self::roll_back(&mut machine, &mut conn, e).await),
                }
            }
            Err(e) => Err(Self::roll_back(&mut machine, &mut conn, e).await),
        };

        conn.release();
        result
    }

    /// Issue ROLLBACK and hand back the error that triggered it.
    async fn roll_back(
        machine: &mut TxMachine,
        conn: &mut PooledConn,
        cause: SqlEzError,
    ) -> SqlEzError {
        if let Err(e) = machine.advance(TxState::RollingBack) {
            return e;
        }
        if let Err(e) = conn.batch_execute("ROLLBACK").await {
            let rollback = SqlEzError::RollbackError(e.to_string());
            tracing::warn!(error = %rollback, cause = %cause, "rollback failed");
        }
        if let Err(e) = machine.advance(TxState::Failed) {
            return e;
        }
        cause
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator").finish_non_exhaustive()
    }
}
