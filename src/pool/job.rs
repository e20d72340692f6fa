//! Job envelope and result handle.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{oneshot, watch};
use tracing::error;

use crate::error::JobError;

pub(crate) type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A job sitting in the pool queue.
///
/// Holding the [`PendingGuard`] keeps the job counted as outstanding; the count
/// drops whether the job runs to completion or is discarded unstarted.
pub(crate) struct QueuedJob {
    pub(crate) task: BoxedTask,
    pub(crate) pending: PendingGuard,
}

impl QueuedJob {
    /// Wrap `job` so that its output, or its panic, is delivered to the returned handle.
    pub(crate) fn new<F, T>(job: F, pending: PendingGuard) -> (Self, JobHandle<T>)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let task = Box::pin(async move {
            let outcome = AssertUnwindSafe(job).catch_unwind().await.map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Recovered from panic in worker job");
                JobError::Panicked(message)
            });
            // The submitter may have stopped listening; the job still counts as done.
            let _ = tx.send(outcome);
        });

        (
            Self { task, pending },
            JobHandle { rx },
        )
    }
}

/// Decrements the pool's outstanding-job counter on drop.
pub(crate) struct PendingGuard {
    pending: Arc<watch::Sender<usize>>,
}

impl PendingGuard {
    pub(crate) fn new(pending: Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|count| *count += 1);
        Self { pending }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Handle to the result of a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    rx: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    /// Wait for the job to finish.
    ///
    /// Returns [`JobError::Panicked`] if the job panicked and
    /// [`JobError::Abandoned`] if the pool shut down before it started.
    pub async fn join(self) -> Result<T, JobError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(JobError::Abandoned),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
