use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{Deferred, Executor};
use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::ResultSet;
use crate::source::ConnectionSource;

/// Pool-wide executor: every call borrows a fresh connection and releases it before returning.
#[derive(Clone)]
pub struct PoolExecutor {
    source: Arc<dyn ConnectionSource>,
}

impl PoolExecutor {
    #[must_use]
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Start the query now and return a handle to await its result later.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn exec_deferred<Q>(&self, query: Q) -> Deferred<ResultSet>
    where
        Q: Into<QueryRequest>,
    {
        let executor = self.clone();
        let request = query.into();
        Deferred::spawn(async move { executor.run(request).await })
    }

    /// Fire-and-forget execution; `callback` receives the outcome on the runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn exec_detached<Q, F>(&self, query: Q, callback: F) -> JoinHandle<()>
    where
        Q: Into<QueryRequest>,
        F: FnOnce(Result<ResultSet, SqlEzError>) + Send + 'static,
    {
        let executor = self.clone();
        let request = query.into();
        tokio::spawn(async move {
            let outcome = executor.run(request).await;
            callback(outcome);
        })
    }
}

impl std::fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl Executor for PoolExecutor {
    async fn run(&self, request: QueryRequest) -> Result<ResultSet, SqlEzError> {
        request.validate()?;
        let mut conn = self.source.acquire().await?;
        let outcome = conn.query(&request).await;
        conn.release();
        outcome
    }
}
