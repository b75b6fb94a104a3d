//! JobWorker — one long-poll loop per task type.
//!
//! Each loop activates jobs for its task type and fans them out onto
//! spawned tasks, bounded by `max_jobs_active` permits. A job runs the
//! handler (`handlers::execute`) and hands the outcome to the
//! `JobCompletionReporter`. Loops stop when the shutdown signal flips and
//! wait for their in-flight jobs before returning.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::engine::{ActivateJobsRequest, EngineClient, Job, JobCompletionReporter};
use crate::handlers::{self, JobHandler, JobOutcome};

/// Sleep after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Tunables shared by all poll loops.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_name: String,
    pub max_jobs_active: usize,
    pub job_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl WorkerSettings {
    pub fn from_config(worker_name: String, engine: &EngineConfig) -> Self {
        Self {
            worker_name,
            max_jobs_active: engine.max_jobs_active.max(1),
            job_timeout: engine.job_timeout(),
            request_timeout: engine.request_timeout(),
            poll_interval: engine.poll_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobWorker
// ---------------------------------------------------------------------------

/// Poll loop binding one handler to its task type.
pub struct JobWorker {
    engine: Arc<dyn EngineClient>,
    handler: Arc<dyn JobHandler>,
    reporter: JobCompletionReporter,
    settings: WorkerSettings,
}

impl JobWorker {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        handler: Arc<dyn JobHandler>,
        reporter: JobCompletionReporter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            engine,
            handler,
            reporter,
            settings,
        }
    }

    /// Run the poll loop until the shutdown signal is received.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let task_type = self.handler.task_type();
        let permits = Arc::new(Semaphore::new(self.settings.max_jobs_active));
        let mut in_flight = JoinSet::new();

        tracing::info!(
            task_type = %task_type,
            worker = %self.settings.worker_name,
            max_jobs_active = self.settings.max_jobs_active,
            "JobWorker started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // Reap finished jobs so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}

            let available = permits.available_permits();
            if available == 0 {
                tokio::select! {
                    _ = in_flight.join_next() => {}
                    _ = shutdown_rx.changed() => break,
                }
                continue;
            }

            let request = ActivateJobsRequest {
                task_type: task_type.as_str().to_string(),
                worker: self.settings.worker_name.clone(),
                max_jobs: i32::try_from(available).unwrap_or(i32::MAX),
                job_timeout: self.settings.job_timeout,
                request_timeout: self.settings.request_timeout,
            };

            // Not raced against shutdown: jobs the engine has already locked
            // for us must be dispatched. The long poll ends by request_timeout.
            let polled = self.engine.activate_jobs(&request).await;

            let idle = match polled {
                Ok(jobs) if jobs.is_empty() => self.settings.poll_interval,
                Ok(jobs) => {
                    tracing::debug!(task_type = %task_type, count = jobs.len(), "Activated jobs");
                    for job in jobs {
                        self.dispatch(job, &permits, &mut in_flight).await;
                    }
                    Duration::ZERO
                }
                Err(e) => {
                    tracing::warn!(task_type = %task_type, error = %e, "Failed to activate jobs");
                    POLL_ERROR_BACKOFF
                }
            };

            if !idle.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(idle) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        }

        tracing::info!(
            task_type = %task_type,
            in_flight = in_flight.len(),
            "JobWorker shutting down, draining in-flight jobs"
        );
        while in_flight.join_next().await.is_some() {}
        tracing::info!(task_type = %task_type, "JobWorker stopped");
    }

    /// Spawn one job onto its own task, holding a permit until it reports.
    async fn dispatch(&self, job: Job, permits: &Arc<Semaphore>, in_flight: &mut JoinSet<()>) {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed; run unbounded rather than drop the job.
            Err(_) => {
                process_job(self.handler.as_ref(), &self.reporter, job).await;
                return;
            }
        };

        let handler = self.handler.clone();
        let reporter = self.reporter.clone();
        in_flight.spawn(async move {
            process_job(handler.as_ref(), &reporter, job).await;
            drop(permit);
        });
    }
}

/// Execute a job and deliver its terminal report.
///
/// Returns the outcome that was reported (or attempted).
pub async fn process_job(
    handler: &dyn JobHandler,
    reporter: &JobCompletionReporter,
    job: Job,
) -> JobOutcome {
    let outcome = handlers::execute(handler, &job).await;

    match &outcome {
        JobOutcome::Complete { variables } => {
            tracing::info!(
                job_key = job.key,
                task_type = %job.task_type,
                process_instance_key = job.process_instance_key,
                bpmn_process_id = %job.bpmn_process_id,
                element_id = %job.element_id,
                "Complete job"
            );
            match reporter.complete(job.key, variables).await {
                Ok(()) => tracing::info!(
                    job_key = job.key,
                    task_type = %job.task_type,
                    "Successfully completed job"
                ),
                // Already timed out or cancelled; nothing left to report on.
                Err(e) if e.is_not_found() => tracing::warn!(
                    job_key = job.key,
                    task_type = %job.task_type,
                    error = %e,
                    "Job no longer exists, completion dropped"
                ),
                Err(e) => {
                    tracing::error!(
                        job_key = job.key,
                        task_type = %job.task_type,
                        error = %e,
                        "Failed to report job completion, failing job instead"
                    );
                    let message = format!("Completion not accepted: {}", e);
                    if let Err(e) = reporter
                        .fail(job.key, job.retries_after_failure(), &message)
                        .await
                    {
                        tracing::error!(
                            job_key = job.key,
                            task_type = %job.task_type,
                            error = %e,
                            "Failed to report job failure"
                        );
                    }
                }
            }
        }
        JobOutcome::Fail { retries, message } => {
            tracing::info!(
                job_key = job.key,
                task_type = %job.task_type,
                process_instance_key = job.process_instance_key,
                element_id = %job.element_id,
                retries,
                message = %message,
                "Failed to complete job"
            );
            if let Err(e) = reporter.fail(job.key, *retries, message).await {
                tracing::error!(
                    job_key = job.key,
                    task_type = %job.task_type,
                    error = %e,
                    "Failed to report job failure"
                );
            }
        }
    }

    outcome
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Spawn one `JobWorker` per handler. Returns the join handles so the
/// caller can await a clean shutdown.
pub fn spawn_workers(
    engine: Arc<dyn EngineClient>,
    handlers: Vec<Arc<dyn JobHandler>>,
    reporter: JobCompletionReporter,
    settings: WorkerSettings,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    handlers
        .into_iter()
        .map(|handler| {
            tracing::info!(task_type = %handler.task_type(), "Registering job worker");
            let worker = JobWorker::new(
                engine.clone(),
                handler,
                reporter.clone(),
                settings.clone(),
            );
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        })
        .collect()
}

/// Flip the shutdown channel once `signal` fires.
///
/// If the signal cannot be awaited the sender is kept alive, so workers keep
/// running instead of seeing a closed channel.
pub async fn relay_shutdown<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
}
