use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::SqlEzError;

/// A result that is already being computed on the runtime and can be awaited later.
///
/// The work starts when the `Deferred` is created, not when it is first polled.
/// Dropping the handle does not cancel the work.
#[derive(Debug)]
pub struct Deferred<T> {
    handle: JoinHandle<Result<T, SqlEzError>>,
}

impl<T: Send + 'static> Deferred<T> {
    /// Start `fut` on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, SqlEzError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(fut),
        }
    }
}

impl<T> Deferred<T> {
    /// True once the underlying work has completed, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, SqlEzError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(SqlEzError::TaskError(format!("deferred task failed: {e}"))),
        })
    }
}
