//! Workflow engine collaborator
//!
//! `EngineClient` is the seam between the workers and the engine: the
//! production implementation is `ZeebeConnection` (gRPC gateway), tests
//! plug in an in-memory fake that records reports.

pub mod reporter;
pub mod zeebe;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EngineError;
use crate::variables::ProcessVariables;

pub use reporter::JobCompletionReporter;
pub use zeebe::ZeebeConnection;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One activated unit of work, as handed out by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Engine-assigned job key.
    pub key: i64,
    /// Task type the job was activated for.
    pub task_type: String,
    /// Retries remaining before the engine raises an incident.
    pub retries: i32,
    /// Raw variables document (JSON object).
    pub variables: String,
    pub process_instance_key: i64,
    pub bpmn_process_id: String,
    /// BPMN element the job was created for.
    pub element_id: String,
}

impl Job {
    /// Retry count to report when this attempt fails.
    pub fn retries_after_failure(&self) -> i32 {
        (self.retries - 1).max(0)
    }
}

/// Parameters of one `ActivateJobs` long poll.
#[derive(Debug, Clone)]
pub struct ActivateJobsRequest {
    pub task_type: String,
    pub worker: String,
    pub max_jobs: i32,
    /// Lock duration for the activated jobs.
    pub job_timeout: Duration,
    /// How long the gateway may hold the poll open.
    pub request_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Process instances
// ---------------------------------------------------------------------------

/// Version selector meaning "latest deployed version".
pub const LATEST_VERSION: i32 = -1;

/// Request to start a process instance.
#[derive(Debug, Clone)]
pub struct CreateInstanceRequest {
    pub bpmn_process_id: String,
    pub version: i32,
    pub variables: ProcessVariables,
    /// Wait for the instance to finish and return its variables.
    pub await_result: Option<Duration>,
}

impl CreateInstanceRequest {
    pub fn latest(bpmn_process_id: impl Into<String>, variables: ProcessVariables) -> Self {
        Self {
            bpmn_process_id: bpmn_process_id.into(),
            version: LATEST_VERSION,
            variables,
            await_result: None,
        }
    }

    pub fn with_result(mut self, timeout: Duration) -> Self {
        self.await_result = Some(timeout);
        self
    }
}

/// What the engine reported back for a created instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceResult {
    pub process_instance_key: i64,
    pub bpmn_process_id: String,
    pub version: i32,
    /// Final variables; `None` unless the instance was awaited.
    pub variables: Option<ProcessVariables>,
}

// ---------------------------------------------------------------------------
// EngineClient
// ---------------------------------------------------------------------------

/// Operations the workers need from the workflow engine.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Long-poll for jobs of one task type. An empty vec means "nothing yet".
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>, EngineError>;

    /// Complete a job, merging `variables` into the instance.
    async fn complete_job(
        &self,
        job_key: i64,
        variables: &ProcessVariables,
    ) -> Result<(), EngineError>;

    /// Fail a job. With `retries > 0` the engine re-activates it after
    /// `retry_backoff`; at zero it raises an incident.
    async fn fail_job(
        &self,
        job_key: i64,
        retries: i32,
        error_message: &str,
        retry_backoff: Duration,
    ) -> Result<(), EngineError>;

    /// Start a process instance, optionally awaiting its result.
    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<InstanceResult, EngineError>;
}
