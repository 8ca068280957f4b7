// PostgreSQL backend
//
// - config: bb8 connection manager, pool setup and TLS connectors
// - params: RowValues as tokio-postgres parameters
// - query: decoding rows into RowValues
// - source: the ConnectionSource / DbConnection implementation

pub mod config;
pub mod params;
pub mod query;
pub mod source;

pub use config::{PgManager, PgTls};
pub use query::postgres_extract_value;
pub use source::{PostgresConnection, PostgresSource};
