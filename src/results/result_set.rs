use std::sync::Arc;

use super::row::{CustomDbRow, RowShape};
use crate::types::RowValues;

/// A buffered result from a database query
///
/// `results` holds decoded rows in the order the driver produced them; `rows_affected`
/// is the driver's count (rows returned for SELECT, rows changed for DML).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected
    pub rows_affected: usize,
    shape: Option<RowShape>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            shape: None,
        }
    }

    /// Set the column layout shared by all rows added through [`ResultSet::add_row_values`].
    pub fn set_shape(&mut self, shape: RowShape) {
        self.shape = Some(shape);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.shape.as_ref().map(RowShape::column_names)
    }

    /// Add a row of values using the current shape (an empty shape if none was set).
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let shape = self.shape.get_or_insert_with(RowShape::default);
        self.results.push(shape.row(row_values));
        self.rows_affected += 1;
    }

    /// Add an already built row.
    pub fn add_row(&mut self, row: CustomDbRow) {
        self.results.push(row);
        self.rows_affected += 1;
    }

    /// The decoded rows, in driver order.
    #[must_use]
    pub fn rows(&self) -> &[CustomDbRow] {
        &self.results
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Rows flattened to their ordered values.
    #[must_use]
    pub fn to_arrays(&self) -> Vec<Vec<RowValues>> {
        self.results.iter().map(|row| row.rows.clone()).collect()
    }
}
