//! sql-ez: one query API in three calling styles, scoped transactions and streaming
//! pipelines whose stages can be declared before a connection exists.
//!
//! ```rust,no_run
//! use sql_ez::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlEzError> {
//! let db = SqlEz::connect(ConnectionConfig::Sqlite(SqliteOptions::new("app.db"))).await?;
//! let users = db.exec("SELECT id, name FROM users").await?;
//! for row in users.rows() {
//!     println!("{:?}", row.get("name"));
//! }
//! # Ok(()) }
//! ```

pub mod prelude;

pub mod config;
pub mod error;
pub mod executor;
pub mod facade;
pub mod query;
pub mod results;
pub mod source;
pub mod stream;
pub mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{ConnectionConfig, PostgresOptions, SqliteOptions, SslMode};
pub use error::{SqlEzError, StageError};
pub use executor::{Deferred, Executor, PoolExecutor, TransactionContext, TransactionExecutor};
pub use facade::SqlEz;
pub use query::QueryRequest;
pub use results::{CustomDbRow, ResultSet, RowShape};
pub use source::{ConnectionSource, DbConnection, PooledConn, RowStream};
pub use stream::{Chunk, Emitter, PipelineDefinition, PipelineHandle, Stage};
pub use transaction::{TransactionCoordinator, TxState};
pub use types::{RowMode, RowValues};
