//! Bounded fan-out of per-key store operations

use crate::StorageError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Result of one sub-task of a fan-out
#[derive(Debug)]
pub struct KeyOutcome {
    pub key: String,
    pub result: Result<(), StorageError>,
}

/// Every sub-task result of one fan-out, in dispatch order
#[derive(Debug)]
pub struct BatchOutcome {
    operation: String,
    outcomes: Vec<KeyOutcome>,
}

impl BatchOutcome {
    pub fn outcomes(&self) -> &[KeyOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Number of succeeded sub-tasks, or `OperationFailed` wrapping the
    /// first failure in dispatch order
    pub fn into_result(self) -> Result<usize, StorageError> {
        let total = self.outcomes.len();
        let failed = self.failed();
        let first_failure = self
            .outcomes
            .into_iter()
            .find_map(|outcome| outcome.result.err());

        match first_failure {
            None => Ok(total),
            Some(cause) => Err(StorageError::OperationFailed {
                message: format!(
                    "{} failed for {} of {} objects",
                    self.operation, failed, total
                ),
                cause: Some(Box::new(cause)),
            }),
        }
    }
}

/// Shared worker pool for multi-object operations.
///
/// Every sub-task runs as its own tokio task holding a permit for its whole
/// life, so at most `workers` store calls are in flight across all fan-outs
/// sharing this executor.
#[derive(Clone)]
pub struct FanOutExecutor {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl FanOutExecutor {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one task per key and wait for all of them.
    ///
    /// A task is only spawned once it holds a permit, so no more than
    /// `workers` tasks exist at a time. Failures never cancel siblings;
    /// each one is logged and recorded.
    pub async fn join_all<Fut>(&self, operation: &str, tasks: Vec<(String, Fut)>) -> BatchOutcome
    where
        Fut: Future<Output = Result<(), StorageError>> + Send + 'static,
    {
        let mut handles = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            let handle = match self.permits.clone().acquire_owned().await {
                Ok(permit) => Ok(tokio::spawn(async move {
                    let _permit = permit;
                    task.await
                })),
                Err(e) => Err(StorageError::operation_failed(format!(
                    "Worker pool closed: {}",
                    e
                ))),
            };
            handles.push((key, handle));
        }

        debug!(operation = operation, tasks = handles.len(), "Dispatched fan-out");

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let result = match handle {
                Ok(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(StorageError::operation_failed(format!(
                        "Task for {} did not complete: {}",
                        key, e
                    ))),
                },
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                error!(operation = operation, key = %key, "Sub-task failed: {}", e);
            }
            outcomes.push(KeyOutcome { key, result });
        }

        BatchOutcome {
            operation: operation.to_string(),
            outcomes,
        }
    }
}
