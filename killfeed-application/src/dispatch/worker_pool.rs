use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{label} timed out after {seconds}s")]
    TimedOut { label: String, seconds: u64 },
    #[error("{label} panicked: {message}")]
    Panicked { label: String, message: String },
    #[error("worker pool closed")]
    Closed,
}

/// Bounded pool for blocking work and batched persistence.
///
/// Blocking closures run on tokio's blocking threads; the semaphore caps how
/// many run at once. A timed-out unit is abandoned but keeps its permit until
/// the underlying call returns, so the bound still holds.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(max_concurrency: usize, timeout: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs a blocking closure off the scheduler thread.
    pub async fn run_blocking<F, T>(&self, label: &str, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(DispatchError::Panicked {
                label: label.to_string(),
                message: err.to_string(),
            }),
            Err(_) => {
                warn!(label, seconds = self.timeout.as_secs(), "blocking unit abandoned after timeout");
                Err(DispatchError::TimedOut {
                    label: label.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Runs an async unit (a batched store write) under the same bound and timeout.
    pub async fn run_async<F, T>(&self, label: &str, work: F) -> Result<T, DispatchError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchError::Closed)?;

        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| {
                warn!(label, seconds = self.timeout.as_secs(), "async unit abandoned after timeout");
                DispatchError::TimedOut {
                    label: label.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            })
    }

    pub fn close(&self) {
        self.permits.close();
    }
}
