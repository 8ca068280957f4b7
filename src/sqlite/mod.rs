// SQLite backend
//
// - config: bb8 connection manager and pool setup
// - params: RowValues as rusqlite values
// - query: decoding rows and buffering result sets
// - source: the ConnectionSource / DbConnection implementation

pub mod config;
pub mod params;
pub mod query;
pub mod source;

pub use config::{SharedSqliteConnection, SqliteManager};
pub use params::Params;
pub use source::{SqliteConnection, SqliteSource};
