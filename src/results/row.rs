use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::types::RowValues;

/// Column names plus a name-to-index lookup, built once per query and shared by every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowShape {
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl RowShape {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        let cache = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            column_names: Arc::new(column_names),
            column_index_cache: Arc::new(cache),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.column_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column_names.is_empty()
    }

    /// Build a row sharing this shape.
    #[must_use]
    pub fn row(&self, values: Vec<RowValues>) -> CustomDbRow {
        CustomDbRow {
            column_names: Arc::clone(&self.column_names),
            rows: values,
            column_index_cache: Arc::clone(&self.column_index_cache),
        }
    }
}

/// A row from a database query result
///
/// Values are kept in column order; lookups by name go through a cache shared with
/// every other row of the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new database row
    ///
    /// Prefer [`RowShape::row`] when building many rows with the same columns.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        RowShape::new(column_names.as_ref().clone()).row(rows)
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Ordered field values of this row.
    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.rows
    }

    /// Consume the row, keeping only its ordered field values.
    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.rows
    }

    /// Render the row as a JSON object keyed by column name.
    ///
    /// # Errors
    /// Returns `serde_json::Error` if a value cannot be serialized.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut map = Map::with_capacity(self.rows.len());
        for (name, value) in self.column_names.iter().zip(&self.rows) {
            map.insert(name.clone(), serde_json::to_value(value)?);
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_shape_and_resolve_names() {
        let shape = RowShape::new(vec!["first_name".into(), "age".into()]);
        let row = shape.row(vec![RowValues::Text("Peter".into()), RowValues::Int(32)]);
        let other = shape.row(vec![RowValues::Text("Samir".into()), RowValues::Int(30)]);

        assert!(Arc::ptr_eq(&row.column_names, &other.column_names));
        assert_eq!(row.get("age"), Some(&RowValues::Int(32)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(0), Some(&RowValues::Text("Peter".into())));
    }

    #[test]
    fn json_keeps_column_names() {
        let shape = RowShape::new(vec!["num".into()]);
        let row = shape.row(vec![RowValues::Int(3)]);
        assert_eq!(row.to_json().unwrap(), serde_json::json!({ "num": 3 }));
    }
}
