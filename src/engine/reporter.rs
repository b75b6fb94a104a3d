//! JobCompletionReporter — delivers a job's terminal report to the engine.
//!
//! A transport error while reporting is retried with bounded exponential
//! backoff (`RetryPolicy`). Errors the engine will keep rejecting (job
//! already gone, malformed request) stop the loop immediately. Either way
//! the error is logged and returned; reporting never takes the process down.

use std::sync::Arc;
use std::time::Duration;

use super::EngineClient;
use crate::config::RetryPolicy;
use crate::error::EngineError;
use crate::variables::ProcessVariables;

/// Sends complete/fail reports with retry.
#[derive(Clone)]
pub struct JobCompletionReporter {
    engine: Arc<dyn EngineClient>,
    policy: RetryPolicy,
    fail_retry_backoff: Duration,
}

impl JobCompletionReporter {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        policy: RetryPolicy,
        fail_retry_backoff: Duration,
    ) -> Self {
        Self {
            engine,
            policy,
            fail_retry_backoff,
        }
    }

    /// Report a job as completed with the full updated variable set.
    pub async fn complete(
        &self,
        job_key: i64,
        variables: &ProcessVariables,
    ) -> Result<(), EngineError> {
        self.with_retry("CompleteJob", job_key, || {
            self.engine.complete_job(job_key, variables)
        })
        .await
    }

    /// Report a job as failed with the remaining retry count.
    pub async fn fail(
        &self,
        job_key: i64,
        retries: i32,
        message: &str,
    ) -> Result<(), EngineError> {
        let backoff = self.fail_retry_backoff;
        self.with_retry("FailJob", job_key, || {
            self.engine.fail_job(job_key, retries, message, backoff)
        })
        .await
    }

    async fn with_retry<F, Fut>(
        &self,
        operation: &'static str,
        job_key: i64,
        mut call: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), EngineError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match call().await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            job_key,
                            operation,
                            attempt,
                            "Engine report succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::error!(
                    job_key,
                    operation,
                    error = %err,
                    "Engine rejected report, not retrying"
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    job_key,
                    operation,
                    attempts = attempt,
                    error = %err,
                    "Engine report failed, retries exhausted"
                );
                return Err(EngineError::RetriesExhausted {
                    operation,
                    job_key,
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.policy.backoff_for(attempt);
            tracing::warn!(
                job_key,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Engine report failed, will retry"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
