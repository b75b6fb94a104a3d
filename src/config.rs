//! Worker configuration: load from YAML, apply environment overrides.
//!
//! Every section has defaults matching the reservation deployment, so a
//! missing config file is not an error. Environment variables win over the
//! file:
//!
//! | Variable             | Field                                  |
//! |----------------------|----------------------------------------|
//! | `ZEEBE_ADDRESS`      | `engine.address` (+ TLS on)            |
//! | `FWW_HTTP_PORT`      | `server.port`                          |
//! | `FWW_REGULATION_URL` | `collaborators.regulation_base_url`    |
//! | `FWW_EMAIL_URL`      | `collaborators.email_base_url`         |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::handlers::TaskType;

/// Default configuration path (overridden by `FWW_WORKFLOW_CONFIG`).
pub const DEFAULT_CONFIG_PATH: &str = "config/workers.yaml";

/// Gateway address used when `ZEEBE_ADDRESS` is unset.
pub const DEFAULT_ENGINE_ADDRESS: &str = "0.0.0.0:26500";

// ---------------------------------------------------------------------------
// WorkflowWorkerConfig
// ---------------------------------------------------------------------------

/// Root configuration loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowWorkerConfig {
    pub engine: EngineConfig,
    pub collaborators: CollaboratorConfig,
    pub server: ServerConfig,
    pub starter: StarterConfig,
    /// Instance created once at boot. Disabled unless configured.
    pub startup_instance: Option<StartupInstanceConfig>,
    /// Task types to register workers for.
    pub workers: Vec<TaskType>,
}

/// Zeebe gateway connection and job worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gateway address as `host:port`.
    pub address: String,
    /// Plaintext (no TLS) transport.
    pub plaintext: bool,
    /// Worker name reported on activation. Generated when absent.
    pub worker_name: Option<String>,
    /// Maximum jobs in flight per task type.
    pub max_jobs_active: usize,
    /// Lock duration handed to the engine on activation.
    pub job_timeout_ms: u64,
    /// Sleep between polls that returned no jobs.
    pub poll_interval_ms: u64,
    /// Long-poll timeout for `ActivateJobs`.
    pub request_timeout_ms: u64,
    /// Delay before the engine re-activates a failed job.
    pub fail_retry_backoff_ms: u64,
    /// Retry policy for complete/fail reports.
    pub report_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ENGINE_ADDRESS.to_string(),
            plaintext: true,
            worker_name: None,
            max_jobs_active: 32,
            job_timeout_ms: 5 * 60 * 1000,
            poll_interval_ms: 100,
            request_timeout_ms: 10_000,
            fail_retry_backoff_ms: 0,
            report_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fail_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.fail_retry_backoff_ms)
    }
}

/// Bounded exponential backoff for engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), doubled each time
    /// and capped at `max_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Regulation-check and email service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub regulation_base_url: String,
    pub email_base_url: String,
    /// Per-request timeout for every outbound call.
    pub request_timeout_ms: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            regulation_base_url: "http://localhost:3004".to_string(),
            email_base_url: "http://localhost:3002".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl CollaboratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Inbound HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3003,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Process created by `/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StarterConfig {
    pub bpmn_process_id: String,
    /// Variables used when the request carries none.
    pub initial_variables: serde_json::Map<String, serde_json::Value>,
    /// Create the instance "with result" and echo `result_field`.
    pub await_result: bool,
    pub result_field: String,
    pub result_timeout_ms: u64,
}

impl Default for StarterConfig {
    fn default() -> Self {
        let mut initial_variables = serde_json::Map::new();
        initial_variables.insert(
            "name".to_string(),
            serde_json::Value::String("Syamsul".to_string()),
        );
        Self {
            bpmn_process_id: "fww-reservation".to_string(),
            initial_variables,
            await_result: true,
            result_field: "say".to_string(),
            result_timeout_ms: 30_000,
        }
    }
}

impl StarterConfig {
    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }
}

/// One-shot instance created when the workers boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupInstanceConfig {
    pub bpmn_process_id: String,
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl WorkflowWorkerConfig {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.fill_defaults();
        Ok(config)
    }

    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Worker config file not found, using defaults"
            );
            let mut config = Self::default();
            config.fill_defaults();
            return Ok(config);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `FWW_WORKFLOW_CONFIG` (or the default path) and apply the
    /// process environment on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("FWW_WORKFLOW_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from_file(Path::new(&path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// A set `ZEEBE_ADDRESS` switches the transport to TLS. Unset, the
    /// configured engine section stands (plaintext loopback by default).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("ZEEBE_ADDRESS").filter(|v| !v.is_empty()) {
            self.engine.address = address;
            self.engine.plaintext = false;
        }

        if let Some(port) = lookup("FWW_HTTP_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                field: "FWW_HTTP_PORT",
                reason: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(url) = lookup("FWW_REGULATION_URL") {
            self.collaborators.regulation_base_url = url;
        }
        if let Some(url) = lookup("FWW_EMAIL_URL") {
            self.collaborators.email_base_url = url;
        }
        Ok(())
    }

    /// Reject settings the workers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_jobs_active == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.max_jobs_active",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine.report_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.report_retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.starter.bpmn_process_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "starter.bpmn_process_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Worker name, generating a unique one if none is configured.
    pub fn worker_name(&self) -> String {
        self.engine
            .worker_name
            .clone()
            .unwrap_or_else(|| format!("fww-workflow-{}", uuid::Uuid::new_v4()))
    }

    fn fill_defaults(&mut self) {
        if self.workers.is_empty() {
            self.workers = TaskType::ALL.to_vec();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
