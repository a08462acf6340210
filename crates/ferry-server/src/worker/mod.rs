//! Worker pool
//!
//! One dispatcher task plus `concurrency` executor tasks. An idle executor
//! offers itself to the dispatcher through a bounded channel; the dispatcher
//! only claims a job once it holds such an offer, so a claimed job is handed
//! straight to a free executor and never waits in a buffer.
//!
//! Shutdown is two-phase. The shutdown token stops new claims and lets
//! running jobs drain. If they are still running after the grace period the
//! abort token fires and the pipeline fails them as cancelled.

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::ImportError;
use crate::jobs::{Job, JobStore, LogSeverity};
use crate::pipeline::{ImportPipeline, JobOutcome};

/// Default number of executors.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default wait after an empty or failed claim.
pub const DEFAULT_IDLE_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of executors; zero is treated as one.
    pub concurrency: usize,
    /// Delay before the next claim when the queue was empty or the claim failed.
    pub idle_delay: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            idle_delay: Duration::from_millis(DEFAULT_IDLE_DELAY_MS),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }
}

/// Counters accumulated while the pool runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub succeeded: u64,
    pub failed: u64,
    /// Jobs failed because the abort token fired. Also counted in `failed`.
    pub aborted: u64,
    /// Jobs whose terminal status or final log entry could not be written.
    pub finalize_errors: u64,
    pub claim_errors: u64,
}

type Slot = oneshot::Sender<Job>;

pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    pipeline: Arc<ImportPipeline>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Arc<ImportPipeline>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            config,
        }
    }

    /// Spawn the dispatcher and executors on the current runtime.
    pub fn start(self) -> PoolHandle {
        let concurrency = self.config.concurrency.max(1);
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let report = Arc::new(Mutex::new(PoolReport::default()));

        let (idle_tx, idle_rx) = mpsc::channel::<Slot>(concurrency);

        let executors = (0..concurrency)
            .map(|worker| {
                let executor = Executor {
                    worker,
                    pipeline: self.pipeline.clone(),
                    idle: idle_tx.clone(),
                    abort: abort.clone(),
                    report: report.clone(),
                };
                tokio::spawn(
                    executor
                        .run()
                        .instrument(info_span!("executor", worker = worker)),
                )
            })
            .collect();
        drop(idle_tx);

        let dispatcher = Dispatcher {
            store: self.store,
            idle: idle_rx,
            idle_delay: self.config.idle_delay,
            shutdown: shutdown.clone(),
            report: report.clone(),
        };
        let dispatcher = tokio::spawn(dispatcher.run().instrument(info_span!("dispatcher")));

        info!(concurrency, idle_delay_ms = self.config.idle_delay.as_millis() as u64, "Worker pool started");

        PoolHandle {
            shutdown,
            abort,
            dispatcher,
            executors,
            report,
        }
    }
}

/// Control handle for a running [`WorkerPool`].
pub struct PoolHandle {
    shutdown: CancellationToken,
    abort: CancellationToken,
    dispatcher: JoinHandle<()>,
    executors: Vec<JoinHandle<()>>,
    report: Arc<Mutex<PoolReport>>,
}

impl PoolHandle {
    /// Cancelling this token stops new claims. Running jobs keep going.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Snapshot of the counters so far.
    pub fn report(&self) -> PoolReport {
        lock(&self.report).clone()
    }

    /// Stop claiming, wait up to `grace` for running jobs, then abort the
    /// rest and wait for them to be marked failed.
    pub async fn shutdown(self, grace: Duration) -> PoolReport {
        info!(grace_secs = grace.as_secs(), "Worker pool shutting down");
        self.shutdown.cancel();

        let tasks = std::iter::once(self.dispatcher).chain(self.executors);
        let mut all = Box::pin(join_all(tasks));

        let results = match tokio::time::timeout(grace, all.as_mut()).await {
            Ok(results) => results,
            Err(_) => {
                warn!("Grace period elapsed, aborting in-flight jobs");
                self.abort.cancel();
                all.await
            },
        };

        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        let report = lock(&self.report).clone();
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            aborted = report.aborted,
            "Worker pool stopped"
        );
        report
    }
}

struct Dispatcher {
    store: Arc<dyn JobStore>,
    idle: mpsc::Receiver<Slot>,
    idle_delay: Duration,
    shutdown: CancellationToken,
    report: Arc<Mutex<PoolReport>>,
}

impl Dispatcher {
    async fn run(mut self) {
        'dispatch: loop {
            let slot = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                slot = self.idle.recv() => match slot {
                    Some(slot) => slot,
                    None => break,
                },
            };

            let job = loop {
                if self.shutdown.is_cancelled() {
                    break 'dispatch;
                }

                match self.store.claim_next().await {
                    Ok(Some(job)) => break job,
                    Ok(None) => debug!("Queue empty"),
                    Err(e) => {
                        error!(error = %e, "Failed to claim job");
                        lock(&self.report).claim_errors += 1;
                        let context = json!({ "error": e.to_string() });
                        if let Err(log_err) = self
                            .store
                            .log(None, LogSeverity::Error, "claim failed", Some(context))
                            .await
                        {
                            warn!(error = %log_err, "Failed to record claim failure");
                        }
                    },
                }

                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break 'dispatch,
                    _ = tokio::time::sleep(self.idle_delay) => {},
                }
            };

            let job_id = job.id;
            debug!(job_id, "Dispatching job");
            if slot.send(job).is_err() {
                // the executor that offered this slot is gone
                error!(job_id, "Executor unavailable, failing claimed job");
                if let Err(e) = self.store.fail(job_id, "worker unavailable").await {
                    error!(job_id, error = %e, "Failed to release claimed job");
                }
            }
        }

        debug!("Dispatcher stopped");
    }
}

struct Executor {
    worker: usize,
    pipeline: Arc<ImportPipeline>,
    idle: mpsc::Sender<Slot>,
    abort: CancellationToken,
    report: Arc<Mutex<PoolReport>>,
}

impl Executor {
    async fn run(self) {
        loop {
            let (slot, assigned) = oneshot::channel();
            if self.idle.send(slot).await.is_err() {
                break;
            }
            // the dispatcher drops pending slots when it stops
            let Ok(job) = assigned.await else {
                break;
            };

            self.execute(job).await;
        }

        debug!(worker = self.worker, "Executor stopped");
    }

    async fn execute(&self, job: Job) {
        let outcome = self.pipeline.process_job(&job, &self.abort).await;

        let mut report = lock(&self.report);
        match outcome {
            Ok(JobOutcome::Succeeded { .. }) => report.succeeded += 1,
            Ok(JobOutcome::Failed { error }) => {
                report.failed += 1;
                if matches!(error, ImportError::Cancelled) {
                    report.aborted += 1;
                }
            },
            Err(e) => {
                error!(job_id = job.id, error = %e, "Failed to finalize job");
                report.finalize_errors += 1;
            },
        }
    }
}

fn lock(report: &Mutex<PoolReport>) -> MutexGuard<'_, PoolReport> {
    report.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
