use std::sync::Arc;

use futures_util::TryStreamExt;
use tokio::sync::mpsc;

use super::stage::{BoxStage, Chunk, Emitter};
use crate::error::SqlEzError;
use crate::query::QueryRequest;
use crate::source::{ConnectionSource, PooledConn};

/// The wired stages of a live pipeline plus the queue of stages still waiting to be wired.
pub(crate) struct Chain {
    stages: Vec<BoxStage>,
    pending: mpsc::UnboundedReceiver<BoxStage>,
}

impl Chain {
    pub(crate) fn new(stages: Vec<BoxStage>, pending: mpsc::UnboundedReceiver<BoxStage>) -> Self {
        Self { stages, pending }
    }

    /// Move every queued stage onto the tail, in the order it was attached.
    fn wire_pending(&mut self) {
        while let Ok(stage) = self.pending.try_recv() {
            tracing::debug!(position = self.stages.len(), "wiring stage");
            self.stages.push(stage);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.stages.len()
    }

    /// Feed one chunk from the row stream into the head of the chain.
    pub(crate) async fn push(&mut self, chunk: Chunk) -> Result<(), SqlEzError> {
        self.wire_pending();
        self.forward(0, vec![chunk]).await
    }

    /// Run `chunks` through the stages from `start` to the tail.
    ///
    /// Whatever the last stage emits has nowhere to go and is dropped.
    async fn forward(&mut self, start: usize, chunks: Vec<Chunk>) -> Result<(), SqlEzError> {
        let mut batch = chunks;
        for position in start..self.stages.len() {
            if batch.is_empty() {
                break;
            }
            let stage = &mut self.stages[position];
            let mut out = Emitter::default();
            for chunk in batch {
                stage
                    .consume(chunk, &mut out)
                    .await
                    .map_err(|source| SqlEzError::StageError { position, source })?;
            }
            batch = out.take();
        }
        Ok(())
    }

    /// Signal end of input to each stage in order, forwarding anything it flushes.
    pub(crate) async fn finish(&mut self) -> Result<(), SqlEzError> {
        let mut position = 0;
        loop {
            self.wire_pending();
            if position >= self.stages.len() {
                break;
            }
            let mut out = Emitter::default();
            self.stages[position]
                .finish(&mut out)
                .await
                .map_err(|source| SqlEzError::StageError { position, source })?;
            self.forward(position + 1, out.take()).await?;
            position += 1;
        }
        self.close();
        Ok(())
    }

    /// Tell every stage, wired or still queued, that the pipeline failed.
    pub(crate) fn abort(&mut self, reason: &SqlEzError) {
        self.wire_pending();
        for stage in &mut self.stages {
            stage.abort(reason);
        }
        self.close();
    }

    fn close(&mut self) {
        self.pending.close();
        while let Ok(_late) = self.pending.try_recv() {
            tracing::warn!("stage attached after the pipeline finished; dropping it");
        }
    }
}

/// Acquire a connection, pump every row through the chain, then finish it.
///
/// The connection is released exactly once, as soon as the row stream is done with it.
pub(crate) async fn drive(
    source: Arc<dyn ConnectionSource>,
    request: QueryRequest,
    mut chain: Chain,
) -> Result<(), SqlEzError> {
    let outcome = run_chain(source.as_ref(), &request, &mut chain).await;
    if let Err(e) = &outcome {
        tracing::debug!(error = %e, "pipeline failed");
        chain.abort(e);
    }
    outcome
}

async fn run_chain(
    source: &dyn ConnectionSource,
    request: &QueryRequest,
    chain: &mut Chain,
) -> Result<(), SqlEzError> {
    request.validate()?;
    let mut conn = source.acquire().await?;
    let pumped = pump(&mut conn, request, chain).await;
    conn.release();
    let rows = pumped?;
    tracing::debug!(rows, "row stream drained");
    chain.finish().await
}

async fn pump(
    conn: &mut PooledConn,
    request: &QueryRequest,
    chain: &mut Chain,
) -> Result<usize, SqlEzError> {
    let mut rows = conn.query_stream(request).await?;
    let mut count = 0;
    while let Some(row) = rows.try_next().await? {
        chain.push(Chunk::Row(row)).await?;
        count += 1;
    }
    Ok(count)
}
