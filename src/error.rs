//! Error types for the workflow workers
//!
//! One `thiserror` enum per concern. Handler errors never escape a job:
//! they are turned into a failure report by `handlers::execute`.

use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors talking to the workflow engine gateway
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to connect to engine at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Invalid engine address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Engine rejected {operation}: {status}")]
    Rpc {
        operation: &'static str,
        status: tonic::Status,
    },

    #[error("Invalid variables document: {0}")]
    Variables(#[from] serde_json::Error),

    #[error("Gave up on {operation} for job {job_key} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        job_key: i64,
        attempts: u32,
        last_error: String,
    },
}

impl EngineError {
    /// The job the call referred to no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Rpc { status, .. } if status.code() == tonic::Code::NotFound)
    }

    /// Whether retrying the same call can succeed.
    ///
    /// The engine answers `NotFound` for jobs that already timed out or were
    /// cancelled, and `InvalidArgument`/`FailedPrecondition` for requests
    /// that will never be accepted.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Rpc { status, .. } => !matches!(
                status.code(),
                tonic::Code::NotFound
                    | tonic::Code::InvalidArgument
                    | tonic::Code::FailedPrecondition
                    | tonic::Code::PermissionDenied
                    | tonic::Code::Unauthenticated
            ),
            EngineError::Connect { .. } => true,
            EngineError::InvalidAddress { .. }
            | EngineError::Variables(_)
            | EngineError::RetriesExhausted { .. } => false,
        }
    }
}

/// Outbound HTTP collaborator errors
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CollaboratorError {
    pub(crate) fn from_send(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            CollaboratorError::Timeout {
                url: url.to_string(),
            }
        } else {
            CollaboratorError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    pub(crate) fn from_decode(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            CollaboratorError::Timeout {
                url: url.to_string(),
            }
        } else {
            CollaboratorError::Decode {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Reasons a single job cannot be completed
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Job variables are not readable: {0}")]
    UnreadableVariables(String),

    #[error("Missing variable '{0}'")]
    MissingVariable(&'static str),

    #[error("Variable '{name}' has the wrong type: expected {expected}")]
    InvalidVariable {
        name: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
