use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool};
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::error::SqlEzError;

/// A rusqlite connection shared between the async side and blocking worker threads.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// bb8 manager opening `SQLite` connections on the blocking pool.
///
/// Every pooled connection to `:memory:` is a separate database, so tests and tools
/// that need shared state should point at a file.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Build a pool from this manager, capped at `pool_size` connections when given.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn build_pool(
        self,
        pool_size: Option<u32>,
    ) -> Result<Pool<SqliteManager>, SqlEzError> {
        let mut builder = Pool::builder();
        if let Some(size) = pool_size {
            builder = builder.max_size(size);
        }
        builder
            .build(self)
            .await
            .map_err(|e| SqlEzError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlEzError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.db_path.clone();
        async move {
            tracing::debug!(path = %path, "sqlite connect start");
            let conn = spawn_blocking(move || -> Result<rusqlite::Connection, SqlEzError> {
                let conn = rusqlite::Connection::open(&path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                Ok(conn)
            })
            .await
            .map_err(|e| SqlEzError::ConnectionError(format!("sqlite open join error: {e}")))??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let conn = Arc::clone(conn);
        async move {
            run_blocking(conn, |c| {
                c.execute_batch("SELECT 1")?;
                Ok(())
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Run `func` against the connection on the blocking pool.
pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, SqlEzError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlEzError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlEzError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
