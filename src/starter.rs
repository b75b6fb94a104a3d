//! Process starter HTTP surface.
//!
//! Endpoints:
//! - GET  /start   - Start the configured process with the default variables
//! - POST /start   - Start it with the JSON object body as initial variables
//! - GET  /health  - Health check

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::StarterConfig;
use crate::engine::{CreateInstanceRequest, EngineClient, InstanceResult};
use crate::handlers::TaskType;
use crate::variables::ProcessVariables;

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct StarterState {
    engine: Arc<dyn EngineClient>,
    config: Arc<StarterConfig>,
    workers: Arc<Vec<TaskType>>,
}

impl StarterState {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        config: StarterConfig,
        workers: Vec<TaskType>,
    ) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            workers: Arc::new(workers),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    workers: Vec<String>,
}

pub fn router(state: StarterState) -> Router {
    Router::new()
        .route("/start", get(start_default).post(start_with_body))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<StarterState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        workers: state.workers.iter().map(|t| t.to_string()).collect(),
    })
}

async fn start_default(State(state): State<StarterState>) -> Result<String, (StatusCode, String)> {
    let variables = ProcessVariables::from(state.config.initial_variables.clone());
    start_instance(&state, variables).await
}

async fn start_with_body(
    State(state): State<StarterState>,
    body: Bytes,
) -> Result<String, (StatusCode, String)> {
    let variables = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessVariables::from(state.config.initial_variables.clone())
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => ProcessVariables::from(map),
            Ok(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Initial variables must be a JSON object".to_string(),
                ))
            }
            Err(e) => return Err((StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e))),
        }
    };
    start_instance(&state, variables).await
}

async fn start_instance(
    state: &StarterState,
    variables: ProcessVariables,
) -> Result<String, (StatusCode, String)> {
    let config = &state.config;
    let mut request = CreateInstanceRequest::latest(config.bpmn_process_id.clone(), variables);
    if config.await_result {
        request = request.with_result(config.result_timeout());
    }

    let result = state.engine.create_instance(&request).await.map_err(|e| {
        tracing::error!(
            bpmn_process_id = %config.bpmn_process_id,
            error = %e,
            "Failed to create process instance"
        );
        (StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    tracing::info!(
        bpmn_process_id = %result.bpmn_process_id,
        process_instance_key = result.process_instance_key,
        version = result.version,
        "Process instance created"
    );

    if config.await_result {
        Ok(render_result_field(&result, &config.result_field))
    } else {
        Ok(result.process_instance_key.to_string())
    }
}

/// Text of the named result variable. Strings are rendered without quotes;
/// a missing variable renders as an empty body.
fn render_result_field(result: &InstanceResult, field: &str) -> String {
    match result.variables.as_ref().and_then(|v| v.get(field)) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => {
            tracing::warn!(
                process_instance_key = result.process_instance_key,
                field,
                "Process result has no such variable"
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ActivateJobsRequest, Job};
    use crate::error::EngineError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Engine that records create requests and answers with fixed variables.
    #[derive(Default)]
    struct StarterEngine {
        created: Mutex<Vec<CreateInstanceRequest>>,
        result_variables: Option<Value>,
        unavailable: bool,
    }

    #[async_trait]
    impl EngineClient for StarterEngine {
        async fn activate_jobs(&self, _: &ActivateJobsRequest) -> Result<Vec<Job>, EngineError> {
            Ok(Vec::new())
        }

        async fn complete_job(&self, _: i64, _: &ProcessVariables) -> Result<(), EngineError> {
            Ok(())
        }

        async fn fail_job(&self, _: i64, _: i32, _: &str, _: Duration) -> Result<(), EngineError> {
            Ok(())
        }

        async fn create_instance(
            &self,
            request: &CreateInstanceRequest,
        ) -> Result<InstanceResult, EngineError> {
            if self.unavailable {
                return Err(EngineError::Rpc {
                    operation: "CreateProcessInstance",
                    status: tonic::Status::unavailable("gateway down"),
                });
            }
            self.created.lock().unwrap().push(request.clone());
            let variables = request.await_result.and_then(|_| {
                self.result_variables
                    .clone()
                    .and_then(|v| v.as_object().cloned())
                    .map(ProcessVariables::from)
            });
            Ok(InstanceResult {
                process_instance_key: 2251799813685249,
                bpmn_process_id: request.bpmn_process_id.clone(),
                version: 3,
                variables,
            })
        }
    }

    fn app(engine: Arc<StarterEngine>, config: StarterConfig) -> Router {
        router(StarterState::new(engine, config, TaskType::ALL.to_vec()))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_start_returns_say_variable() {
        let engine = Arc::new(StarterEngine {
            result_variables: Some(json!({"name": "Syamsul", "say": "Hello Syamsul"})),
            ..Default::default()
        });

        let response = app(engine.clone(), StarterConfig::default())
            .oneshot(Request::get("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Hello Syamsul");

        let created = engine.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].bpmn_process_id, "fww-reservation");
        assert_eq!(created[0].version, -1);
        assert_eq!(created[0].variables.get("name"), Some(&json!("Syamsul")));
        assert_eq!(created[0].await_result, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_post_body_replaces_initial_variables() {
        let engine = Arc::new(StarterEngine {
            result_variables: Some(json!({"say": 7})),
            ..Default::default()
        });

        let response = app(engine.clone(), StarterConfig::default())
            .oneshot(
                Request::post("/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"passengerId":"3201","reservationId":9}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "7");

        let created = engine.created.lock().unwrap();
        assert_eq!(created[0].variables.get("name"), None);
        assert_eq!(created[0].variables.get("passengerId"), Some(&json!("3201")));
    }

    #[tokio::test]
    async fn test_post_non_object_is_bad_request() {
        let engine = Arc::new(StarterEngine::default());

        let response = app(engine.clone(), StarterConfig::default())
            .oneshot(Request::post("/start").body(Body::from("[1,2]")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(engine.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_await_returns_instance_key() {
        let engine = Arc::new(StarterEngine::default());
        let config = StarterConfig {
            await_result: false,
            ..Default::default()
        };

        let response = app(engine.clone(), config)
            .oneshot(Request::get("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "2251799813685249");
        assert_eq!(engine.created.lock().unwrap()[0].await_result, None);
    }

    #[tokio::test]
    async fn test_missing_result_field_is_empty_body() {
        let engine = Arc::new(StarterEngine {
            result_variables: Some(json!({"name": "Syamsul"})),
            ..Default::default()
        });

        let response = app(engine, StarterConfig::default())
            .oneshot(Request::get("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_engine_error_is_bad_gateway() {
        let engine = Arc::new(StarterEngine {
            unavailable: true,
            ..Default::default()
        });

        let response = app(engine, StarterConfig::default())
            .oneshot(Request::get("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_health_lists_workers() {
        let response = app(Arc::new(StarterEngine::default()), StarterConfig::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["workers"][0], "check-blacklist");
        assert_eq!(body["workers"].as_array().unwrap().len(), 5);
    }
}
