use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures_util::{StreamExt, TryStreamExt};

use super::config::{PgManager, PgTls};
use super::query::{extract_row, statement_shape};
use crate::config::PostgresOptions;
use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::results::{CustomDbRow, ResultSet};
use crate::source::{ConnectionSource, DbConnection, PooledConn, RowStream};

/// Postgres connections from a bb8 pool.
#[derive(Clone)]
pub struct PostgresSource {
    pool: Pool<PgManager>,
}

impl PostgresSource {
    /// Build a pool from `opts`, connecting over TLS when its `sslmode` asks for it.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` for incomplete settings or an unusable TLS setup,
    /// and `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn from_options(opts: &PostgresOptions) -> Result<Self, SqlEzError> {
        let config = opts.to_pg_config()?;
        let tls = PgTls::new(opts.ssl_mode(&config), opts.ssl_root_cert.as_deref())?;
        Self::connect_with_tls(config, tls, opts.pool_size).await
    }

    /// Build a pool of plain-TCP connections for `config`.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn connect(
        config: tokio_postgres::Config,
        pool_size: Option<u32>,
    ) -> Result<Self, SqlEzError> {
        Self::connect_with_tls(config, PgTls::Disabled, pool_size).await
    }

    /// # Errors
    /// Returns `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn connect_with_tls(
        config: tokio_postgres::Config,
        tls: PgTls,
        pool_size: Option<u32>,
    ) -> Result<Self, SqlEzError> {
        let pool = PgManager::with_tls(config, tls).build_pool(pool_size).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: Pool<PgManager>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<PgManager> {
        &self.pool
    }
}

impl std::fmt::Debug for PostgresSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSource")
            .field("state", &self.pool.state())
            .finish()
    }
}

#[async_trait]
impl ConnectionSource for PostgresSource {
    async fn acquire(&self) -> Result<PooledConn, SqlEzError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            SqlEzError::ConnectionError(format!("postgres checkout error: {e}"))
        })?;
        tracing::debug!("acquired postgres connection");
        Ok(PooledConn::new(PostgresConnection { conn }))
    }
}

/// One pooled Postgres client; returns to the pool when dropped.
pub struct PostgresConnection {
    conn: PooledConnection<'static, PgManager>,
}

#[async_trait]
impl DbConnection for PostgresConnection {
    async fn query(&mut self, request: &QueryRequest) -> Result<ResultSet, SqlEzError> {
        let stmt = self.conn.prepare(&request.text).await?;
        let mut result_set = ResultSet::with_capacity(16);
        result_set.set_shape(statement_shape(&stmt));

        let mut rows = Box::pin(self.conn.query_raw(&stmt, request.values.iter()).await?);
        while let Some(row) = rows.try_next().await? {
            result_set.add_row_values(extract_row(&row)?);
        }
        // DML reports changed rows rather than returned rows
        if let Some(affected) = rows.rows_affected() {
            result_set.rows_affected = usize::try_from(affected).map_err(|e| {
                SqlEzError::ExecutionError(format!(
                    "postgres affected rows conversion error: {e}"
                ))
            })?;
        }
        Ok(result_set)
    }

    async fn query_stream<'a>(
        &'a mut self,
        request: &'a QueryRequest,
    ) -> Result<RowStream<'a>, SqlEzError> {
        let stmt = self.conn.prepare(&request.text).await?;
        let shape = statement_shape(&stmt);
        let rows = self.conn.query_raw(&stmt, request.values.iter()).await?;
        Ok(rows
            .map(move |item| -> Result<CustomDbRow, SqlEzError> {
                let row = item?;
                Ok(shape.row(extract_row(&row)?))
            })
            .boxed())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), SqlEzError> {
        self.conn.batch_execute(sql).await?;
        Ok(())
    }
}
