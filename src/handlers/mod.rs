//! Job handlers, one per BPMN service task type.
//!
//! Every handler follows the same shape: read a typed input from the
//! process variables, call one collaborator, and derive the value of one
//! designated output variable. `execute` wraps that into an explicit
//! `JobOutcome`, so every job ends in exactly one complete or fail report.
//!
//! | Task type              | Handler                  | Output variable        |
//! |------------------------|--------------------------|------------------------|
//! | `check-blacklist`      | `RegulationCheckHandler` | `blacklistUser`        |
//! | `check-dukcapil`       | `RegulationCheckHandler` | `dukcapil`             |
//! | `check-pedulilindungi` | `RegulationCheckHandler` | `peduliLindungi`       |
//! | `send-email-booking`   | `SendEmailHandler`       | `sendEmailReservation` |
//! | `send-email-unpaid`    | `SendEmailHandler`       | `sendEmail`            |

pub mod email;
pub mod regulation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::collaborator::{EmailClient, RegulationCheck, RegulationClient};
use crate::engine::Job;
use crate::error::HandlerError;
use crate::variables::ProcessVariables;

pub use email::{EmailNotification, SendEmailHandler};
pub use regulation::RegulationCheckHandler;

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// BPMN service task types served by this worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    CheckBlacklist,
    CheckDukcapil,
    CheckPedulilindungi,
    SendEmailBooking,
    SendEmailUnpaid,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::CheckBlacklist,
        TaskType::CheckDukcapil,
        TaskType::CheckPedulilindungi,
        TaskType::SendEmailBooking,
        TaskType::SendEmailUnpaid,
    ];

    /// Name used to route jobs in the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckBlacklist => "check-blacklist",
            Self::CheckDukcapil => "check-dukcapil",
            Self::CheckPedulilindungi => "check-pedulilindungi",
            Self::SendEmailBooking => "send-email-booking",
            Self::SendEmailUnpaid => "send-email-unpaid",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobHandler
// ---------------------------------------------------------------------------

/// Computes the variable mutation for one job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// The single variable this handler writes.
    fn output_variable(&self) -> &'static str;

    /// Call the collaborator and derive the output variable's new value.
    async fn derive(
        &self,
        variables: &ProcessVariables,
    ) -> Result<serde_json::Value, HandlerError>;
}

/// Terminal decision for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Complete with the full updated variable set.
    Complete { variables: ProcessVariables },
    /// Fail with the remaining retry count.
    Fail { retries: i32, message: String },
}

impl JobOutcome {
    fn failed(job: &Job, error: &HandlerError) -> Self {
        JobOutcome::Fail {
            retries: job.retries_after_failure(),
            message: error.to_string(),
        }
    }
}

/// Run a handler against a job and decide its outcome.
///
/// Does not talk to the engine; the worker hands the outcome to the
/// `JobCompletionReporter`.
pub async fn execute(handler: &dyn JobHandler, job: &Job) -> JobOutcome {
    let mut variables = match ProcessVariables::from_document(&job.variables) {
        Ok(variables) => variables,
        Err(e) => {
            tracing::warn!(
                job_key = job.key,
                task_type = %job.task_type,
                error = %e,
                "Job variables unreadable"
            );
            return JobOutcome::failed(job, &e);
        }
    };

    match handler.derive(&variables).await {
        Ok(value) => {
            tracing::debug!(
                job_key = job.key,
                task_type = %job.task_type,
                variable = handler.output_variable(),
                value = %value,
                "Derived job result"
            );
            variables.set(handler.output_variable(), value);
            JobOutcome::Complete { variables }
        }
        Err(e) => {
            tracing::warn!(
                job_key = job.key,
                task_type = %job.task_type,
                retries = job.retries,
                error = %e,
                "Job handler failed"
            );
            JobOutcome::failed(job, &e)
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Build the handler bound to a task type.
pub fn handler_for(
    task_type: TaskType,
    regulation: &RegulationClient,
    email: &EmailClient,
) -> Arc<dyn JobHandler> {
    match task_type {
        TaskType::CheckBlacklist => Arc::new(RegulationCheckHandler::new(
            RegulationCheck::Blacklist,
            regulation.clone(),
        )),
        TaskType::CheckDukcapil => Arc::new(RegulationCheckHandler::new(
            RegulationCheck::Dukcapil,
            regulation.clone(),
        )),
        TaskType::CheckPedulilindungi => Arc::new(RegulationCheckHandler::new(
            RegulationCheck::PeduliLindungi,
            regulation.clone(),
        )),
        TaskType::SendEmailBooking => Arc::new(SendEmailHandler::new(
            EmailNotification::Booking,
            email.clone(),
        )),
        TaskType::SendEmailUnpaid => Arc::new(SendEmailHandler::new(
            EmailNotification::Unpaid,
            email.clone(),
        )),
    }
}

/// Handlers for the given task types, in order, without duplicates.
pub fn build_handlers(
    task_types: &[TaskType],
    regulation: &RegulationClient,
    email: &EmailClient,
) -> Vec<Arc<dyn JobHandler>> {
    let mut seen: Vec<TaskType> = Vec::new();
    task_types
        .iter()
        .filter(|t| {
            if seen.contains(*t) {
                false
            } else {
                seen.push(**t);
                true
            }
        })
        .map(|t| handler_for(*t, regulation, email))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
