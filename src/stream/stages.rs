use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::stage::{Chunk, Emitter, Stage};
use crate::error::StageError;

/// Row-shape transform: keyed rows become the ordered sequence of their values.
///
/// Inserted automatically in front of caller stages when a query asks for `RowMode::Array`.
/// Chunks that are not rows pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowsToArray;

#[async_trait]
impl Stage for RowsToArray {
    async fn consume(&mut self, chunk: Chunk, out: &mut Emitter) -> Result<(), StageError> {
        match chunk {
            Chunk::Row(row) => out.push(Chunk::Array(row.into_values())),
            other => out.push(other),
        }
        Ok(())
    }
}

/// Sink built from a closure.
pub struct FnSink<F> {
    func: F,
}

/// Build a sink that hands every chunk to `func`.
pub fn sink<F>(func: F) -> FnSink<F>
where
    F: FnMut(Chunk) -> Result<(), StageError> + Send,
{
    FnSink { func }
}

#[async_trait]
impl<F> Stage for FnSink<F>
where
    F: FnMut(Chunk) -> Result<(), StageError> + Send,
{
    async fn consume(&mut self, chunk: Chunk, _out: &mut Emitter) -> Result<(), StageError> {
        (self.func)(chunk)
    }
}

/// Transform built from a closure.
pub struct FnTransform<F> {
    func: F,
}

/// Build a transform; `func` pushes zero or more output chunks per input chunk.
pub fn transform<F>(func: F) -> FnTransform<F>
where
    F: FnMut(Chunk, &mut Emitter) -> Result<(), StageError> + Send,
{
    FnTransform { func }
}

#[async_trait]
impl<F> Stage for FnTransform<F>
where
    F: FnMut(Chunk, &mut Emitter) -> Result<(), StageError> + Send,
{
    async fn consume(&mut self, chunk: Chunk, out: &mut Emitter) -> Result<(), StageError> {
        (self.func)(chunk, out)
    }
}

/// Sink that keeps every chunk it sees; read them through [`Collect::handle`].
#[derive(Debug, Default, Clone)]
pub struct Collect {
    chunks: Arc<Mutex<Vec<Chunk>>>,
}

impl Collect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the collected chunks, usable after the sink moved into a pipeline.
    #[must_use]
    pub fn handle(&self) -> CollectHandle {
        CollectHandle {
            chunks: Arc::clone(&self.chunks),
        }
    }
}

#[async_trait]
impl Stage for Collect {
    async fn consume(&mut self, chunk: Chunk, _out: &mut Emitter) -> Result<(), StageError> {
        self.chunks
            .lock()
            .map_err(|_| StageError::new("collect buffer poisoned"))?
            .push(chunk);
        Ok(())
    }
}

/// Read side of a [`Collect`] sink.
#[derive(Debug, Clone)]
pub struct CollectHandle {
    chunks: Arc<Mutex<Vec<Chunk>>>,
}

impl CollectHandle {
    /// Snapshot of everything collected so far.
    #[must_use]
    pub fn chunks(&self) -> Vec<Chunk> {
        match self.chunks.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.chunks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializes rows and arrays to newline-terminated JSON text.
///
/// Keyed rows become objects, arrays become JSON arrays; text and bytes pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLines;

#[async_trait]
impl Stage for JsonLines {
    async fn consume(&mut self, chunk: Chunk, out: &mut Emitter) -> Result<(), StageError> {
        let json = match chunk {
            Chunk::Row(row) => row.to_json()?,
            Chunk::Array(values) => serde_json::to_value(values)?,
            other => {
                out.push(other);
                return Ok(());
            }
        };
        let mut line = serde_json::to_string(&json)?;
        line.push('\n');
        out.push(Chunk::Text(line));
        Ok(())
    }
}

/// Sink writing text and byte chunks to any async writer (file, stdout, socket).
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> Stage for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn consume(&mut self, chunk: Chunk, _out: &mut Emitter) -> Result<(), StageError> {
        match chunk {
            Chunk::Text(text) => self.writer.write_all(text.as_bytes()).await?,
            Chunk::Bytes(bytes) => self.writer.write_all(&bytes).await?,
            Chunk::Row(_) | Chunk::Array(_) => {
                return Err(StageError::new(
                    "writer sink accepts text or bytes; put JsonLines in front of it",
                ));
            }
        }
        Ok(())
    }

    async fn finish(&mut self, _out: &mut Emitter) -> Result<(), StageError> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::RowShape;
    use crate::types::RowValues;

    fn row(n: i64) -> Chunk {
        Chunk::Row(RowShape::new(vec!["num".into()]).row(vec![RowValues::Int(n)]))
    }

    #[tokio::test]
    async fn rows_to_array_drops_keys() {
        let mut out = Emitter::default();
        RowsToArray.consume(row(4), &mut out).await.unwrap();
        RowsToArray
            .consume(Chunk::Text("x".into()), &mut out)
            .await
            .unwrap();
        assert_eq!(
            out.take(),
            vec![Chunk::Array(vec![RowValues::Int(4)]), Chunk::Text("x".into())]
        );
    }

    #[tokio::test]
    async fn json_lines_renders_objects_and_arrays() {
        let mut out = Emitter::default();
        let mut stage = JsonLines;
        stage.consume(row(1), &mut out).await.unwrap();
        stage
            .consume(
                Chunk::Array(vec![RowValues::Int(2), RowValues::Text("b".into())]),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(
            out.take(),
            vec![
                Chunk::Text("{\"num\":1}\n".into()),
                Chunk::Text("[2,\"b\"]\n".into())
            ]
        );
    }

    #[tokio::test]
    async fn writer_sink_rejects_rows() {
        let mut out = Emitter::default();
        let mut stage = WriterSink::new(Vec::<u8>::new());
        assert!(stage.consume(row(1), &mut out).await.is_err());
        stage
            .consume(Chunk::Text("ok\n".into()), &mut out)
            .await
            .unwrap();
        stage.finish(&mut out).await.unwrap();
        assert_eq!(stage.into_inner(), b"ok\n".to_vec());
    }

    #[tokio::test]
    async fn collect_is_readable_after_move() {
        let collect = Collect::new();
        let handle = collect.handle();
        let mut stage: Box<dyn Stage> = Box::new(collect);
        let mut out = Emitter::default();
        stage.consume(row(9), &mut out).await.unwrap();
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.chunks()[0].first_int(), Some(9));
    }
}
