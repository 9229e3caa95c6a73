use std::{fmt, future::Future};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use crate::error::{GuardError, Result};

/// Bounded worker pool for engine round trips.
///
/// Requests are spawned here so that a latency-sensitive caller never drives
/// engine I/O on its own thread. The pool either owns a dedicated runtime or
/// borrows a handle to an existing one.
pub struct IoPool {
    handle: Handle,
    runtime: Option<Runtime>,
    workers: usize,
}

impl fmt::Debug for IoPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoPool")
            .field("workers", &self.workers)
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl IoPool {
    /// Start a dedicated multi-threaded runtime with `workers` threads.
    pub fn new(workers: usize, thread_name: &str) -> Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name(thread_name)
            .enable_all()
            .build()
            .map_err(|err| {
                GuardError::Internal(format!(
                    "failed to start I/O pool: {err}"
                ))
            })?;
        debug!(workers, thread_name, "I/O pool started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            workers,
        })
    }

    /// Run requests on an existing runtime instead of a dedicated one.
    pub fn from_handle(handle: Handle) -> Self {
        let workers = handle.metrics().num_workers();
        Self {
            handle,
            runtime: None,
            workers,
        }
    }

    /// Borrow the runtime the caller is currently running on.
    pub fn current() -> Result<Self> {
        Handle::try_current().map(Self::from_handle).map_err(|err| {
            GuardError::Internal(format!("no tokio runtime available: {err}"))
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `future` on the pool and wait for its output.
    ///
    /// Dropping the returned future detaches the spawned work; it still runs
    /// to completion and its output is discarded.
    pub async fn run<F>(&self, operation: &'static str, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future).await.map_err(|err| {
            if err.is_cancelled() {
                GuardError::Cancelled(format!(
                    "{operation} was cancelled before completing"
                ))
            } else {
                GuardError::Dispatch(format!("{operation} panicked: {err}"))
            }
        })
    }
}

impl Drop for IoPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            // A plain drop panics when it happens inside an async context.
            runtime.shutdown_background();
        }
    }
}
