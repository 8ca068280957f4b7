use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::{CustomDbRow, ResultSet};

/// Live stream of decoded rows; ends after the last row or on the first error.
pub type RowStream<'a> = BoxStream<'a, Result<CustomDbRow, SqlEzError>>;

/// One physical connection borrowed from a pool.
///
/// Implementations return the connection to its pool when dropped.
#[async_trait]
pub trait DbConnection: Send {
    /// Run one query and buffer every row it returns.
    async fn query(&mut self, request: &QueryRequest) -> Result<ResultSet, SqlEzError>;

    /// Start a query and hand back its rows as they arrive.
    ///
    /// Errors raised before the first row (bad SQL, wrong parameter count) are returned
    /// here; later failures arrive as an `Err` item of the stream.
    async fn query_stream<'a>(
        &'a mut self,
        request: &'a QueryRequest,
    ) -> Result<RowStream<'a>, SqlEzError>;

    /// Execute parameterless SQL such as `BEGIN`, `COMMIT` or `ROLLBACK`.
    async fn batch_execute(&mut self, sql: &str) -> Result<(), SqlEzError>;
}

/// Where connections come from.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Borrow a connection.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConnectionError` (or a driver error) when no connection can be had.
    async fn acquire(&self) -> Result<PooledConn, SqlEzError>;
}

/// A borrowed connection plus its release.
///
/// `release` may be called any number of times; only the first call returns the
/// connection. Dropping an unreleased `PooledConn` releases it.
pub struct PooledConn {
    conn: Option<Box<dyn DbConnection>>,
}

impl PooledConn {
    pub fn new(conn: impl DbConnection + 'static) -> Self {
        Self {
            conn: Some(Box::new(conn)),
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.conn.is_none()
    }

    /// Give the connection back. Later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("releasing connection");
            drop(conn);
        }
    }

    fn conn_mut(&mut self) -> Result<&mut Box<dyn DbConnection>, SqlEzError> {
        self.conn.as_mut().ok_or_else(|| {
            SqlEzError::ConnectionError("connection already released".to_string())
        })
    }

    /// # Errors
    /// Returns the driver error, or `ConnectionError` if already released.
    pub async fn query(&mut self, request: &QueryRequest) -> Result<ResultSet, SqlEzError> {
        self.conn_mut()?.query(request).await
    }

    /// # Errors
    /// Returns the driver error, or `ConnectionError` if already released.
    pub async fn query_stream<'a>(
        &'a mut self,
        request: &'a QueryRequest,
    ) -> Result<RowStream<'a>, SqlEzError> {
        self.conn_mut()?.query_stream(request).await
    }

    /// # Errors
    /// Returns the driver error, or `ConnectionError` if already released.
    pub async fn batch_execute(&mut self, sql: &str) -> Result<(), SqlEzError> {
        self.conn_mut()?.batch_execute(sql).await
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PooledConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConn")
            .field("released", &self.is_released())
            .finish()
    }
}
