use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::SqlEzError;
use crate::executor::{Deferred, Executor, PoolExecutor, TransactionContext};
use crate::query::QueryRequest;
use crate::results::ResultSet;
use crate::source::ConnectionSource;
use crate::stream::PipelineDefinition;
use crate::transaction::TransactionCoordinator;
use crate::types::RowValues;

/// Entry point: query execution in every calling style, transactions and streaming
/// pipelines, all over one [`ConnectionSource`].
///
/// Cheap to clone; clones share the pool.
///
/// ```rust,no_run
/// use sql_ez::prelude::*;
///
/// # async fn demo() -> Result<(), SqlEzError> {
/// let db = SqlEz::connect(ConnectionConfig::from_env()?).await?;
///
/// // awaitable
/// let rows = db.exec(("SELECT $1::int AS n", vec![RowValues::Int(1)])).await?;
///
/// // deferred
/// let later = db.exec_deferred("SELECT 2 AS n");
/// let rows_later = later.await?;
///
/// // callback
/// db.exec_detached("SELECT 3 AS n", |outcome| {
///     if let Err(e) = outcome {
///         eprintln!("query failed: {e}");
///     }
/// });
/// # let _ = (rows, rows_later);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct SqlEz {
    pool: PoolExecutor,
}

impl SqlEz {
    pub fn new(source: impl ConnectionSource + 'static) -> Self {
        Self::from_source(Arc::new(source))
    }

    #[must_use]
    pub fn from_source(source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            pool: PoolExecutor::new(source),
        }
    }

    /// Build the pool described by `config`.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` for incomplete settings or a backend this build
    /// leaves out, and `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, SqlEzError> {
        match config {
            #[cfg(feature = "postgres")]
            ConnectionConfig::Postgres(opts) => {
                let source = crate::postgres::PostgresSource::from_options(&opts).await?;
                Ok(Self::new(source))
            }
            #[cfg(feature = "sqlite")]
            ConnectionConfig::Sqlite(opts) => {
                let source =
                    crate::sqlite::SqliteSource::connect(&opts.db_path, opts.pool_size).await?;
                Ok(Self::new(source))
            }
            #[allow(unreachable_patterns)]
            _ => Err(SqlEzError::ConfigError(
                "backend not compiled into this build".to_string(),
            )),
        }
    }

    /// The pool-wide executor behind this facade.
    #[must_use]
    pub fn pool(&self) -> &PoolExecutor {
        &self.pool
    }

    #[must_use]
    pub fn source(&self) -> Arc<dyn ConnectionSource> {
        Arc::clone(self.pool.source())
    }

    /// Start a query now; await the returned handle whenever the result is needed.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn exec_deferred<Q>(&self, query: Q) -> Deferred<ResultSet>
    where
        Q: Into<QueryRequest>,
    {
        self.pool.exec_deferred(query)
    }

    /// Run a query in the background and hand its outcome to `callback`.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn exec_detached<Q, F>(&self, query: Q, callback: F) -> JoinHandle<()>
    where
        Q: Into<QueryRequest>,
        F: FnOnce(Result<ResultSet, SqlEzError>) + Send + 'static,
    {
        self.pool.exec_detached(query, callback)
    }

    /// Run `work` inside BEGIN / COMMIT on one connection; any failure rolls back.
    ///
    /// # Errors
    /// See [`TransactionCoordinator::run`].
    pub async fn transaction<F, Fut, T>(&self, work: F) -> Result<T, SqlEzError>
    where
        F: FnOnce(TransactionContext) -> Fut + Send,
        Fut: Future<Output = Result<T, SqlEzError>> + Send,
        T: Send,
    {
        TransactionCoordinator::new(self.source()).run(work).await
    }

    /// Define a streaming pipeline for `query`. Nothing runs until it is launched.
    pub fn stream<Q>(&self, query: Q) -> PipelineDefinition
    where
        Q: Into<QueryRequest>,
    {
        PipelineDefinition::new(self.source(), query.into())
    }

    /// [`SqlEz::stream`] with a separate parameter list.
    pub fn stream_params<Q>(&self, query: Q, params: Vec<RowValues>) -> PipelineDefinition
    where
        Q: Into<QueryRequest>,
    {
        PipelineDefinition::new(self.source(), QueryRequest::build(query, Some(params)))
    }
}

#[async_trait]
impl Executor for SqlEz {
    async fn run(&self, request: QueryRequest) -> Result<ResultSet, SqlEzError> {
        self.pool.run(request).await
    }
}
