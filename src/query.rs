use crate::error::SqlEzError;
use crate::types::{RowMode, RowValues};

/// A SQL string, its bound parameters and the requested row shape.
///
/// Built once per call and never mutated after it is handed to an executor:
/// ```rust
/// use sql_ez::prelude::*;
///
/// let req = QueryRequest::new("SELECT $1::INT AS n")
///     .with_values(vec![RowValues::Int(1)])
///     .with_row_mode(RowMode::Array);
/// assert_eq!(req.values.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// The SQL query string
    pub text: String,
    /// Positional parameters, bound in order
    pub values: Vec<RowValues>,
    /// Row shape requested by the caller
    pub row_mode: RowMode,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
            row_mode: RowMode::Tuple,
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: Vec<RowValues>) -> Self {
        self.values = values;
        self
    }

    #[must_use]
    pub fn with_row_mode(mut self, row_mode: RowMode) -> Self {
        self.row_mode = row_mode;
        self
    }

    /// Shorthand for `with_row_mode(RowMode::Array)`.
    #[must_use]
    pub fn array_rows(self) -> Self {
        self.with_row_mode(RowMode::Array)
    }

    /// Normalize a query plus an optional separate parameter list into one request.
    ///
    /// Values already carried by a structured request win; `params` only fill a request
    /// that has none.
    pub fn build(query: impl Into<QueryRequest>, params: Option<Vec<RowValues>>) -> Self {
        let mut request = query.into();
        if request.values.is_empty()
            && let Some(params) = params
        {
            request.values = params;
        }
        request
    }

    /// Reject requests no driver could run.
    ///
    /// # Errors
    /// Returns `SqlEzError::ParameterError` when the query text is blank.
    pub fn validate(&self) -> Result<(), SqlEzError> {
        if self.text.trim().is_empty() {
            return Err(SqlEzError::ParameterError(
                "query text must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_array_mode(&self) -> bool {
        self.row_mode == RowMode::Array
    }
}

impl From<&str> for QueryRequest {
    fn from(text: &str) -> Self {
        QueryRequest::new(text)
    }
}

impl From<String> for QueryRequest {
    fn from(text: String) -> Self {
        QueryRequest::new(text)
    }
}

impl From<&String> for QueryRequest {
    fn from(text: &String) -> Self {
        QueryRequest::new(text.as_str())
    }
}

impl From<(&str, Vec<RowValues>)> for QueryRequest {
    fn from((text, values): (&str, Vec<RowValues>)) -> Self {
        QueryRequest::new(text).with_values(values)
    }
}

impl From<(String, Vec<RowValues>)> for QueryRequest {
    fn from((text, values): (String, Vec<RowValues>)) -> Self {
        QueryRequest::new(text).with_values(values)
    }
}

impl From<&QueryRequest> for QueryRequest {
    fn from(request: &QueryRequest) -> Self {
        request.clone()
    }
}
