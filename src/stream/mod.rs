//! Streaming pipelines: declare stages first, acquire a connection only on launch.
//!
//! ```rust,no_run
//! use sql_ez::prelude::*;
//!
//! # async fn demo(db: SqlEz) -> Result<(), SqlEzError> {
//! let mut sum = 0;
//! db.stream(QueryRequest::new("SELECT * FROM generate_series(0, 10) num").array_rows())
//!     .attach(sink(move |chunk| {
//!         sum += chunk.first_int().unwrap_or_default();
//!         Ok(())
//!     }))
//!     .await?;
//! # Ok(()) }
//! ```

mod driver;
mod stage;
mod stages;

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

pub use stage::{BoxStage, Chunk, Emitter, Stage};
pub use stages::{
    Collect, CollectHandle, FnSink, FnTransform, JsonLines, RowsToArray, WriterSink, sink,
    transform,
};

use crate::error::SqlEzError;
use crate::executor::Deferred;
use crate::query::QueryRequest;
use crate::source::ConnectionSource;
use driver::Chain;

/// A pipeline that has not touched the database yet.
///
/// Stages declared here are wired in declaration order once the pipeline launches.
#[must_use = "a pipeline does nothing until it is launched or awaited"]
pub struct PipelineDefinition {
    source: Arc<dyn ConnectionSource>,
    request: QueryRequest,
    stages: Vec<BoxStage>,
}

impl PipelineDefinition {
    pub(crate) fn new(source: Arc<dyn ConnectionSource>, request: QueryRequest) -> Self {
        Self {
            source,
            request,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Number of stages declared so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Queue a stage without launching.
    pub fn declare(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Queue a stage and launch the pipeline.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn attach(self, stage: impl Stage + 'static) -> PipelineHandle {
        self.declare(stage).launch()
    }

    /// Launch with whatever has been declared; a pipeline with no stages just drains the query.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn launch(self) -> PipelineHandle {
        let Self {
            source,
            request,
            stages: declared,
        } = self;

        let mut stages: Vec<BoxStage> = Vec::with_capacity(declared.len() + 1);
        if request.is_array_mode() {
            stages.push(Box::new(RowsToArray));
        }
        stages.extend(declared);
        tracing::debug!(stages = stages.len(), "launching pipeline");

        let (pending, queued) = mpsc::unbounded_channel();
        let chain = Chain::new(stages, queued);
        PipelineHandle {
            pending,
            completion: Deferred::spawn(driver::drive(source, request, chain)),
        }
    }
}

impl IntoFuture for PipelineDefinition {
    type Output = Result<(), SqlEzError>;
    type IntoFuture = PipelineHandle;

    fn into_future(self) -> Self::IntoFuture {
        self.launch()
    }
}

impl std::fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("request", &self.request)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

/// A launched pipeline. Resolves once the whole chain has drained, or with the first error.
#[must_use = "dropping the handle does not stop the pipeline, but its outcome is lost"]
pub struct PipelineHandle {
    pending: mpsc::UnboundedSender<BoxStage>,
    completion: Deferred<()>,
}

impl PipelineHandle {
    /// Append a stage to the live tail of the chain.
    ///
    /// It sees every chunk forwarded after it is wired. Attaching after the pipeline has
    /// finished drops the stage with a warning.
    pub fn attach(self, stage: impl Stage + 'static) -> Self {
        if self.pending.send(Box::new(stage)).is_err() {
            tracing::warn!("stage attached after the pipeline finished; dropping it");
        }
        self
    }

    /// True once the pipeline has completed, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }
}

impl Future for PipelineHandle {
    type Output = Result<(), SqlEzError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx)
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
