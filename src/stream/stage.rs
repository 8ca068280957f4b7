use async_trait::async_trait;

use crate::error::{SqlEzError, StageError};
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// One unit of data flowing between pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// A keyed row straight from the driver
    Row(CustomDbRow),
    /// A row flattened to its ordered values
    Array(Vec<RowValues>),
    /// Text produced by a transform (for example a JSON line)
    Text(String),
    /// Raw bytes produced by a transform
    Bytes(Vec<u8>),
}

impl Chunk {
    #[must_use]
    pub fn as_row(&self) -> Option<&CustomDbRow> {
        if let Chunk::Row(row) = self {
            Some(row)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[RowValues]> {
        if let Chunk::Array(values) = self {
            Some(values)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Chunk::Text(text) = self {
            Some(text)
        } else {
            None
        }
    }

    /// First field of a row or array chunk.
    #[must_use]
    pub fn first_value(&self) -> Option<&RowValues> {
        match self {
            Chunk::Row(row) => row.get_by_index(0),
            Chunk::Array(values) => values.first(),
            Chunk::Text(_) | Chunk::Bytes(_) => None,
        }
    }

    /// First field as an integer, parsing text chunks.
    #[must_use]
    pub fn first_int(&self) -> Option<i64> {
        match self {
            Chunk::Text(text) => text.trim().parse().ok(),
            _ => self.first_value().and_then(RowValues::as_int).copied(),
        }
    }
}

/// Collects the chunks a stage produces for the next stage.
#[derive(Debug, Default)]
pub struct Emitter {
    chunks: Vec<Chunk>,
}

impl Emitter {
    /// Hand a chunk to the next stage.
    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.chunks)
    }
}

/// A sink or transform in a streaming pipeline.
///
/// Sinks simply never push to the emitter. Stages see chunks strictly in pipeline order.
#[async_trait]
pub trait Stage: Send {
    /// Consume one chunk, pushing any output for the next stage onto `out`.
    ///
    /// # Errors
    /// Returning an error stops the whole pipeline.
    async fn consume(&mut self, chunk: Chunk, out: &mut Emitter) -> Result<(), StageError>;

    /// Upstream has ended; flush anything buffered.
    ///
    /// # Errors
    /// Returning an error fails the pipeline.
    async fn finish(&mut self, _out: &mut Emitter) -> Result<(), StageError> {
        Ok(())
    }

    /// The pipeline failed; no more chunks will arrive.
    fn abort(&mut self, _reason: &SqlEzError) {}
}

pub type BoxStage = Box<dyn Stage>;
