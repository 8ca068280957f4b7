use std::sync::Arc;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures_util::StreamExt;
use futures_util::stream;
use rusqlite::params_from_iter;
use tokio::sync::{mpsc, oneshot};
use tokio::task::spawn_blocking;

use super::config::{SharedSqliteConnection, SqliteManager, run_blocking};
use super::params::Params;
use super::query::{build_result_set, extract_row, statement_shape};
use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::{CustomDbRow, ResultSet};
use crate::source::{ConnectionSource, DbConnection, PooledConn, RowStream};

/// Rows buffered between the blocking reader and the async consumer.
const STREAM_BUFFER: usize = 64;

type RowItem = Result<CustomDbRow, SqlEzError>;

/// `SQLite` connections from a bb8 pool.
#[derive(Clone)]
pub struct SqliteSource {
    pool: Pool<SqliteManager>,
}

impl SqliteSource {
    /// Open a pool on `db_path`.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn connect(db_path: &str, pool_size: Option<u32>) -> Result<Self, SqlEzError> {
        let pool = SqliteManager::new(db_path).build_pool(pool_size).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: Pool<SqliteManager>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("state", &self.pool.state())
            .finish()
    }
}

#[async_trait]
impl ConnectionSource for SqliteSource {
    async fn acquire(&self) -> Result<PooledConn, SqlEzError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            SqlEzError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        tracing::debug!("acquired sqlite connection");
        Ok(PooledConn::new(SqliteConnection { conn }))
    }
}

/// One pooled `SQLite` connection; statements run on the blocking pool.
pub struct SqliteConnection {
    conn: PooledConnection<'static, SqliteManager>,
}

impl SqliteConnection {
    fn handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }
}

#[async_trait]
impl DbConnection for SqliteConnection {
    async fn query(&mut self, request: &QueryRequest) -> Result<ResultSet, SqlEzError> {
        let sql = request.text.clone();
        let params = Params::convert(&request.values);
        run_blocking(self.handle(), move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            build_result_set(&mut stmt, params.as_values())
        })
        .await
    }

    async fn query_stream<'a>(
        &'a mut self,
        request: &'a QueryRequest,
    ) -> Result<RowStream<'a>, SqlEzError> {
        let sql = request.text.clone();
        let params = Params::convert(&request.values);
        let handle = self.handle();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (row_tx, row_rx) = mpsc::channel::<RowItem>(STREAM_BUFFER);

        spawn_blocking(move || {
            let mut guard = handle.blocking_lock();
            read_rows(&mut guard, &sql, &params, ready_tx, &row_tx);
        });

        ready_rx.await.map_err(|e| {
            SqlEzError::ExecutionError(format!("sqlite reader stopped before the first row: {e}"))
        })??;

        let rows = stream::unfold(row_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(rows.boxed())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), SqlEzError> {
        let sql = sql.to_owned();
        run_blocking(self.handle(), move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }
}

/// Step through the query on a blocking thread, sending each decoded row.
///
/// `ready` reports whether the statement prepared and bound; after that, failures travel
/// as `Err` rows. Stops early once the consumer hangs up.
fn read_rows(
    conn: &mut rusqlite::Connection,
    sql: &str,
    params: &Params,
    ready: oneshot::Sender<Result<(), SqlEzError>>,
    rows: &mpsc::Sender<RowItem>,
) {
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    let shape = statement_shape(&stmt);
    let width = shape.len();
    let mut cursor = match stmt.query(params_from_iter(params.as_values().iter())) {
        Ok(cursor) => cursor,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    loop {
        let item = match cursor.next() {
            Ok(Some(row)) => extract_row(row, width).map(|values| shape.row(values)),
            Ok(None) => return,
            Err(e) => Err(e.into()),
        };
        let failed = item.is_err();
        if rows.blocking_send(item).is_err() || failed {
            return;
        }
    }
}
