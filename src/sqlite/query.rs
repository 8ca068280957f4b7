use rusqlite::types::Value;
use rusqlite::{Statement, params_from_iter};

use crate::error::SqlEzError;
use crate::results::{ResultSet, RowShape};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlEzError::SqliteError` if the column cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlEzError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

pub(crate) fn statement_shape(stmt: &Statement<'_>) -> RowShape {
    RowShape::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

pub(crate) fn extract_row(row: &rusqlite::Row, width: usize) -> Result<Vec<RowValues>, SqlEzError> {
    (0..width)
        .map(|idx| sqlite_extract_value_sync(row, idx))
        .collect()
}

/// Run a prepared statement and buffer what it returns.
///
/// Statements without result columns (DML, DDL) are executed and report the number of
/// changed rows; everything else reports the number of rows returned.
///
/// # Errors
/// Returns `SqlEzError::SqliteError` if binding, stepping or decoding fails.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &[Value]) -> Result<ResultSet, SqlEzError> {
    let shape = statement_shape(stmt);
    let mut result_set = ResultSet::with_capacity(10);

    if shape.is_empty() {
        let changed = stmt.execute(params_from_iter(params.iter()))?;
        result_set.set_shape(shape);
        result_set.rows_affected = changed;
        return Ok(result_set);
    }

    let width = shape.len();
    result_set.set_shape(shape);
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        result_set.add_row_values(extract_row(row, width)?);
    }
    Ok(result_set)
}
