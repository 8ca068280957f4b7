//! Convenient imports for common functionality.
//!
//! `use sql_ez::prelude::*;` brings in the facade, the executor trait, request and
//! result types, and the built-in pipeline stages.

pub use crate::config::{ConnectionConfig, PostgresOptions, SqliteOptions, SslMode};
pub use crate::error::{SqlEzError, StageError};
pub use crate::executor::{Deferred, Executor, TransactionContext};
pub use crate::facade::SqlEz;
pub use crate::query::QueryRequest;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::source::{ConnectionSource, DbConnection, PooledConn};
pub use crate::stream::{
    BoxStage, Chunk, Collect, CollectHandle, Emitter, JsonLines, PipelineDefinition,
    PipelineHandle, RowsToArray, Stage, WriterSink, sink, transform,
};
pub use crate::types::{RowMode, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresSource;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteSource;
