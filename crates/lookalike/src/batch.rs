//! Concurrent batch execution.
//!
//! Cases fan out over a bounded pool: a [`Semaphore`] caps how many run at
//! once, the fetch/decode/compare work of each runs on tokio's blocking pool,
//! and the runner alone drains finished tasks from a [`JoinSet`]. Every input
//! case yields exactly one [`TestResult`]:
//!
//! - recoverable failures are recorded by the executor itself,
//! - non-recoverable errors and panics are caught at the task boundary and
//!   recorded as failures,
//! - timed-out cases are recorded as failures,
//! - cancelled cases are recorded as failures flagged
//!   [`TestResult::is_cancelled`].

use crate::case::{TestCase, TestResult};
use crate::executor::{failed_from_error, CaseExecutor};
use crate::result::{LookalikeError, LookalikeResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// Workers per available core; fetching and decoding spend much of their time waiting
pub const IO_BOUND_FACTOR: usize = 2;

/// Batch runner configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum cases in flight (0 = auto-detect)
    pub max_workers: usize,
    /// Per-case time limit in milliseconds
    pub case_timeout_ms: Option<u64>,
}

impl BatchConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker bound
    #[must_use]
    pub const fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Set the per-case time limit
    #[must_use]
    pub const fn with_case_timeout(mut self, timeout: Duration) -> Self {
        self.case_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-case time limit
    #[must_use]
    pub const fn case_timeout(&self) -> Option<Duration> {
        match self.case_timeout_ms {
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        }
    }

    /// Get effective number of workers
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        let workers = if self.max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                * IO_BOUND_FACTOR
        } else {
            self.max_workers
        };
        workers.clamp(1, Semaphore::MAX_PERMITS)
    }
}

/// Cloneable handle that cancels a running batch
#[derive(Debug, Clone, Default)]
pub struct BatchCancellation {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl BatchCancellation {
    /// Create a handle that is not yet cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every batch observing this handle
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancelled
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Fans test cases out over a bounded worker pool
#[derive(Debug, Clone)]
pub struct BatchRunner {
    executor: CaseExecutor,
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner
    #[must_use]
    pub const fn new(executor: CaseExecutor, config: BatchConfig) -> Self {
        Self { executor, config }
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every case. Results arrive in completion order.
    pub async fn run(&self, cases: Vec<TestCase>) -> Vec<TestResult> {
        self.run_with(cases, &BatchCancellation::new(), |_| {})
            .await
    }

    /// Run every case, observing `cancel` and reporting each finished result
    /// to `on_result` as it completes.
    pub async fn run_with<F>(
        &self,
        cases: Vec<TestCase>,
        cancel: &BatchCancellation,
        mut on_result: F,
    ) -> Vec<TestResult>
    where
        F: FnMut(&TestResult),
    {
        let started = Instant::now();
        let workers = self.config.effective_workers();
        let timeout = self.config.case_timeout();
        tracing::info!(cases = cases.len(), workers, "starting batch");

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (index, case) in cases.iter().cloned().enumerate() {
            let executor = self.executor.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                (index, run_case(executor, case, permits, cancel, timeout).await)
            });
        }

        let mut finished = vec![false; cases.len()];
        let mut results = Vec::with_capacity(cases.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    finished[index] = true;
                    on_result(&result);
                    results.push(result);
                }
                Err(e) => tracing::error!(error = %e, "case task ended without a result"),
            }
        }

        // A task torn down by the runtime still owes its case a result
        for (case, _) in cases.iter().zip(&finished).filter(|(_, done)| !**done) {
            let result = failed_from_error(case, &LookalikeError::unexpected("case task was aborted"));
            on_result(&result);
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.test_passed).count();
        tracing::info!(
            passed,
            failed = results.len() - passed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        results
    }

    /// Run every case on a fresh multi-threaded runtime
    ///
    /// Returns as soon as every case has a result. Blocking work abandoned by a
    /// timeout is detached rather than awaited.
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be created
    ///
    /// # Panics
    ///
    /// Panics when called from within a tokio runtime; use [`run`](Self::run)
    /// there instead.
    pub fn run_blocking(&self, cases: Vec<TestCase>) -> LookalikeResult<Vec<TestResult>> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let results = rt.block_on(self.run(cases));
        rt.shutdown_background();
        Ok(results)
    }
}

async fn run_case(
    executor: CaseExecutor,
    case: TestCase,
    permits: Arc<Semaphore>,
    cancel: BatchCancellation,
    timeout: Option<Duration>,
) -> TestResult {
    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return TestResult::cancelled(&case),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return TestResult::cancelled(&case),
        },
    };

    let blocking_case = case.clone();
    // The permit travels with the blocking work so the bound holds even for
    // work abandoned on timeout or cancellation.
    let work = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        executor.execute(&blocking_case)
    });

    let outcome = match timeout {
        Some(limit) => tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = tokio::time::timeout(limit, work) => Some(joined.map_err(|_| limit)),
        },
        None => tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = work => Some(Ok(joined)),
        },
    };

    match outcome {
        None => TestResult::cancelled(&case),
        Some(Err(limit)) => {
            tracing::warn!(test_id = %case.test_id, limit_ms = limit.as_millis() as u64, "case timed out");
            TestResult::failure(&case, format!("Timed out after {}ms.", limit.as_millis()))
        }
        Some(Ok(Ok(Ok(result)))) => result,
        Some(Ok(Ok(Err(error)))) => {
            tracing::error!(test_id = %case.test_id, %error, "unexpected error executing case");
            failed_from_error(&case, &error)
        }
        Some(Ok(Err(join_error))) => {
            let message = join_error_message(join_error);
            tracing::error!(test_id = %case.test_id, message, "case panicked");
            failed_from_error(&case, &LookalikeError::unexpected(message))
        }
    }
}

fn join_error_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload: Box<dyn Any + Send> = error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "case panicked".to_string()
    }
}
