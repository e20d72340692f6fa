//! Bounded worker pool for resize jobs.
//!
//! ```text
//! submit ──► [ bounded FIFO queue, 2 × workers ] ──► worker 0..N ──► catch_unwind(job)
//!                                                                        │
//!                                                JobHandle::join ◄───────┘  Result<T, JobError>
//! ```
//!
//! A job that panics is reported as [`JobError::Panicked`](crate::error::JobError)
//! to its submitter; the worker that ran it keeps serving the queue.

mod executor;
mod job;

pub use executor::{WorkerPool, DEFAULT_POOL_SIZE};
pub use job::JobHandle;
