//! Fixed-size worker pool over a bounded job queue.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::job::{JobHandle, PendingGuard, QueuedJob};
use crate::error::JobError;

/// Default number of workers.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Queue slots per worker.
const QUEUE_SLOTS_PER_WORKER: usize = 2;

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<QueuedJob>>>;

/// Bounded-concurrency job executor.
///
/// A fixed set of tokio tasks pull jobs from one shared FIFO queue holding up
/// to `2 * size` entries. When the queue is full, [`submit`](Self::submit)
/// waits for a free slot.
///
/// Must be created inside a tokio runtime.
///
/// # Example
///
/// ```
/// use antman_proxy::pool::WorkerPool;
///
/// #[tokio::main]
/// async fn main() {
///     let pool = WorkerPool::new(4);
///     let handle = pool.submit(async { 2 + 2 }).await.unwrap();
///     assert_eq!(handle.join().await, Ok(4));
///     pool.shutdown();
/// }
/// ```
pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    pending: Arc<watch::Sender<usize>>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start a pool with `size` workers. A size of zero is clamped to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(size * QUEUE_SLOTS_PER_WORKER);
        let receiver: SharedReceiver = Arc::new(AsyncMutex::new(receiver));
        let (pending, _) = watch::channel(0usize);
        let (shutdown, _) = watch::channel(false);

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        info!(workers = size, queue = size * QUEUE_SLOTS_PER_WORKER, "Worker pool started");

        Self {
            size,
            sender: Mutex::new(Some(sender)),
            pending: Arc::new(pending),
            shutdown,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a job, waiting for a free slot if the queue is full.
    ///
    /// The job's output, or the panic that ended it, is delivered through the
    /// returned handle. Fails with [`JobError::ShutDown`] once
    /// [`shutdown`](Self::shutdown) has been called.
    pub async fn submit<F, T>(&self, job: F) -> Result<JobHandle<T>, JobError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(JobError::ShutDown)?;

        let (queued, handle) = QueuedJob::new(job, PendingGuard::new(Arc::clone(&self.pending)));

        sender.send(queued).await.map_err(|_| JobError::ShutDown)?;
        Ok(handle)
    }

    /// Wait until every submitted job has completed or been abandoned.
    pub async fn wait(&self) {
        let mut pending = self.pending.subscribe();
        // The sender lives in `self`, so this only returns once the count hits zero.
        let _ = pending.wait_for(|count| *count == 0).await;
    }

    /// Stop accepting jobs and tell workers to stop pulling from the queue.
    ///
    /// Jobs already running finish. Queued jobs that have not started are
    /// dropped and their handles resolve to [`JobError::Abandoned`].
    pub fn shutdown(&self) {
        let closed = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if closed {
            self.shutdown.send_replace(true);
            info!("Worker pool shutting down");
        }
    }

    /// Shut down and wait for all worker tasks to exit.
    pub async fn shutdown_and_join(&self) {
        self.shutdown();

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs submitted but not yet completed or abandoned.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(id: usize, receiver: SharedReceiver, mut shutdown: watch::Receiver<bool>) {
    debug!(worker = id, "Worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            break;
        };

        let QueuedJob { task, pending } = job;
        task.await;
        drop(pending);
    }

    debug!(worker = id, "Worker stopped");
}
