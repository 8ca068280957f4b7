use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlEzError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Stage {position} failed: {source}")]
    StageError {
        /// Position of the failing stage in the wired chain (0 is the first stage).
        position: usize,
        #[source]
        source: StageError,
    },

    #[error("Rollback error: {0}")]
    RollbackError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlEzError {
    /// The stage error carried by this error, if a pipeline stage raised it.
    #[must_use]
    pub fn as_stage_error(&self) -> Option<&StageError> {
        match self {
            SqlEzError::StageError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure raised by a pipeline stage while consuming or finishing.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StageError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        StageError::with_source(format!("io error: {err}"), err)
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::with_source(format!("json error: {err}"), err)
    }
}
