//! FWW Workflow - job workers for the flight reservation process
//!
//! Long-polls the workflow engine for the reservation process's service
//! tasks, calls the HTTP collaborators that own each check or email, and
//! reports every job back as completed or failed. A small HTTP surface
//! starts new reservation instances.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐    ActivateJobs     ┌────────────────────────┐
//! │  Zeebe gateway       │ ──────────────────► │  JobWorker (per task)  │
//! │  (gRPC)              │ ◄────────────────── │  fan-out per job       │
//! └──────────────────────┘  Complete/FailJob   └────────────────────────┘
//!            ▲                                             │
//!            │ CreateProcessInstance                       ▼
//! ┌──────────────────────┐                     ┌────────────────────────┐
//! │  Starter (axum)      │                     │  JobHandler            │
//! │  GET|POST /start     │                     │  regulation / email    │
//! └──────────────────────┘                     └────────────────────────┘
//!                                                          │ reqwest
//!                                                          ▼
//!                                              ┌────────────────────────┐
//!                                              │  HTTP collaborators    │
//!                                              └────────────────────────┘
//! ```

pub mod collaborator;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod proto;
pub mod starter;
pub mod variables;
pub mod worker;

pub use config::WorkflowWorkerConfig;
pub use engine::{EngineClient, JobCompletionReporter, ZeebeConnection};
pub use error::{CollaboratorError, ConfigError, EngineError, HandlerError};
pub use handlers::{JobHandler, JobOutcome, TaskType};
pub use variables::ProcessVariables;
pub use worker::{spawn_workers, JobWorker, WorkerSettings};
