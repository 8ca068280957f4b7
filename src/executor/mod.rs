mod deferred;
mod pool;
mod transaction;

pub use deferred::Deferred;
pub use pool::PoolExecutor;
pub use transaction::{TransactionContext, TransactionExecutor};

use async_trait::async_trait;

use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Something that can run a query: the pool as a whole, or one transaction's pinned connection.
///
/// Only [`Executor::run`] is backend-specific; every calling convention is built on it, so
/// transactional code calls the same methods as pool-wide code:
/// ```rust,no_run
/// use sql_ez::prelude::*;
///
/// async fn count_users(db: &impl Executor) -> Result<usize, SqlEzError> {
///     Ok(db.exec("SELECT id FROM users").await?.len())
/// }
/// ```
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one normalized request.
    ///
    /// # Errors
    /// Returns the driver's error, a `ConnectionError` if no connection could be used, or a
    /// `ParameterError` for a blank query.
    async fn run(&self, request: QueryRequest) -> Result<ResultSet, SqlEzError>;

    /// Awaitable execution.
    ///
    /// # Errors
    /// See [`Executor::run`].
    async fn exec<Q>(&self, query: Q) -> Result<ResultSet, SqlEzError>
    where
        Q: Into<QueryRequest> + Send,
    {
        self.run(query.into()).await
    }

    /// Awaitable execution with a separate parameter list.
    ///
    /// Parameters are bound only when the request carries no values of its own.
    ///
    /// # Errors
    /// See [`Executor::run`].
    async fn exec_params<Q>(
        &self,
        query: Q,
        params: Vec<RowValues>,
    ) -> Result<ResultSet, SqlEzError>
    where
        Q: Into<QueryRequest> + Send,
    {
        self.run(QueryRequest::build(query, Some(params))).await
    }

    /// Callback-style execution: the outcome goes to `callback`, nothing is returned.
    async fn exec_with_callback<Q, F>(&self, query: Q, callback: F)
    where
        Q: Into<QueryRequest> + Send,
        F: FnOnce(Result<ResultSet, SqlEzError>) + Send,
    {
        let outcome = self.run(query.into()).await;
        callback(outcome);
    }
}
