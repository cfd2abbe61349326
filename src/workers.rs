use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::executor::{ThreadPool, block_on};
use futures::future::{self, BoxFuture, FutureExt};
use futures::task::SpawnExt;
use thiserror::Error;

use crate::config::WorkerConfig;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to start worker pool: {0}")]
    Start(#[from] std::io::Error),
}

/// A forked task that did not run to completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task {index} failed: {message}")]
pub struct TaskFailure {
    pub index: usize,
    pub message: String,
}

impl TaskFailure {
    fn from_panic(index: usize, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "task panicked".to_string()
        };
        Self { index, message }
    }
}

/// Bounded pool of background threads shared by commands.
///
/// Cloning is cheap, clones share the same threads.
#[derive(Debug, Clone)]
pub struct Workers {
    pool: ThreadPool,
    threads: usize,
}

impl Workers {
    pub fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let pool = ThreadPool::builder()
            .pool_size(config.threads)
            .name_prefix(config.name_prefix.clone())
            .create()?;
        log::debug!("Started worker pool with {} threads", config.threads);
        Ok(Self {
            pool,
            threads: config.threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs every task on the pool and blocks until all of them have finished.
    ///
    /// A task that panics does not take the caller down: its slot in the
    /// returned list holds a [`TaskFailure`] and the other tasks still complete.
    pub fn fork_join<F>(&self, tasks: Vec<F>) -> Vec<Result<(), TaskFailure>>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending: Vec<BoxFuture<'static, Result<(), TaskFailure>>> = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let guarded = AssertUnwindSafe(async move { task() }).catch_unwind();
            match self.pool.spawn_with_handle(guarded) {
                Ok(handle) => pending.push(
                    handle
                        .map(move |result| result.map_err(|payload| TaskFailure::from_panic(index, payload)))
                        .boxed(),
                ),
                Err(err) => pending.push(
                    future::ready(Err(TaskFailure {
                        index,
                        message: err.to_string(),
                    }))
                    .boxed(),
                ),
            }
        }

        let results = block_on(future::join_all(pending));
        for failure in results.iter().filter_map(|result| result.as_ref().err()) {
            log::error!("{}", failure);
        }
        results
    }
}
