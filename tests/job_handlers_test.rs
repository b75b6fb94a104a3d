//! End-to-end job processing against fake collaborators and a recording engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;

use fww_workflow::collaborator::{EmailClient, RegulationClient};
use fww_workflow::config::RetryPolicy;
use fww_workflow::engine::{ActivateJobsRequest, CreateInstanceRequest, InstanceResult, Job};
use fww_workflow::handlers::{build_handlers, handler_for};
use fww_workflow::worker::process_job;
use fww_workflow::{
    EngineClient, EngineError, JobCompletionReporter, JobOutcome, ProcessVariables, TaskType,
};

// ============================================================================
// Harness
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Report {
    Complete(i64, ProcessVariables),
    Fail(i64, i32, String),
}

#[derive(Default)]
struct RecordingEngine {
    reports: Mutex<Vec<Report>>,
}

impl RecordingEngine {
    fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineClient for RecordingEngine {
    async fn activate_jobs(&self, _: &ActivateJobsRequest) -> Result<Vec<Job>, EngineError> {
        Ok(Vec::new())
    }

    async fn complete_job(
        &self,
        job_key: i64,
        variables: &ProcessVariables,
    ) -> Result<(), EngineError> {
        self.reports
            .lock()
            .unwrap()
            .push(Report::Complete(job_key, variables.clone()));
        Ok(())
    }

    async fn fail_job(
        &self,
        job_key: i64,
        retries: i32,
        message: &str,
        _: Duration,
    ) -> Result<(), EngineError> {
        self.reports
            .lock()
            .unwrap()
            .push(Report::Fail(job_key, retries, message.to_string()));
        Ok(())
    }

    async fn create_instance(
        &self,
        _: &CreateInstanceRequest,
    ) -> Result<InstanceResult, EngineError> {
        unreachable!("job processing never creates instances")
    }
}

struct Harness {
    server: MockServer,
    engine: Arc<RecordingEngine>,
    reporter: JobCompletionReporter,
    regulation: RegulationClient,
    email: EmailClient,
}

impl Harness {
    async fn start(collaborator_timeout: Duration) -> Self {
        let server = MockServer::start_async().await;
        let engine = Arc::new(RecordingEngine::default());
        let reporter =
            JobCompletionReporter::new(engine.clone(), RetryPolicy::default(), Duration::ZERO);
        let regulation = RegulationClient::new(server.base_url(), collaborator_timeout).unwrap();
        let email = EmailClient::new(server.base_url(), collaborator_timeout).unwrap();
        Self {
            server,
            engine,
            reporter,
            regulation,
            email,
        }
    }

    async fn run(&self, task_type: TaskType, job: Job) -> JobOutcome {
        let handler = handler_for(task_type, &self.regulation, &self.email);
        process_job(handler.as_ref(), &self.reporter, job).await
    }
}

fn job(key: i64, task_type: TaskType, variables: &str, retries: i32) -> Job {
    Job {
        key,
        task_type: task_type.as_str().to_string(),
        retries,
        variables: variables.to_string(),
        process_instance_key: 2251799813685249,
        bpmn_process_id: "fww-reservation".to_string(),
        element_id: task_type.as_str().replace('-', "_"),
    }
}

// ============================================================================
// Regulation checks
// ============================================================================

#[tokio::test]
async fn blacklisted_passenger_completes_with_flag() {
    let h = Harness::start(Duration::from_secs(5)).await;
    let mock = h
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/check/blacklist")
                .json_body(json!({"ktp": "3201010101010001"}));
            then.status(200).json_body(json!({"status": true}));
        })
        .await;

    h.run(
        TaskType::CheckBlacklist,
        job(1, TaskType::CheckBlacklist, r#"{"passengerId":"3201010101010001"}"#, 3),
    )
    .await;

    mock.assert_async().await;
    let expected = ProcessVariables::from_document(
        r#"{"passengerId":"3201010101010001","blacklistUser":true}"#,
    )
    .unwrap();
    assert_eq!(h.engine.reports(), vec![Report::Complete(1, expected)]);
}

#[tokio::test]
async fn dukcapil_status_string_is_stored() {
    let h = Harness::start(Duration::from_secs(5)).await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/check/dukcapil");
            then.status(200).json_body(json!({"status": "VALID"}));
        })
        .await;

    let outcome = h
        .run(
            TaskType::CheckDukcapil,
            job(2, TaskType::CheckDukcapil, r#"{"passengerId":"77","orderId":"31243"}"#, 3),
        )
        .await;

    let JobOutcome::Complete { variables } = outcome else {
        panic!("dukcapil job should complete");
    };
    assert_eq!(variables.len(), 3);
    assert_eq!(variables.get("dukcapil"), Some(&json!("VALID")));
    assert_eq!(variables.get("orderId"), Some(&json!("31243")));
}

#[tokio::test]
async fn collaborator_error_status_fails_job() {
    let h = Harness::start(Duration::from_secs(5)).await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/check/pedulilindungi");
            then.status(503).body("maintenance");
        })
        .await;

    h.run(
        TaskType::CheckPedulilindungi,
        job(3, TaskType::CheckPedulilindungi, r#"{"passengerId":"1"}"#, 3),
    )
    .await;

    let reports = h.engine.reports();
    assert_eq!(reports.len(), 1);
    match &reports[0] {
        Report::Fail(3, 2, message) => assert!(message.contains("503"), "{}", message),
        other => panic!("expected failure report, got {:?}", other),
    }
}

// ============================================================================
// Emails
// ============================================================================

#[tokio::test]
async fn booking_email_accepts_float_reservation_id() {
    let h = Harness::start(Duration::from_secs(5)).await;
    let mock = h
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/send-email")
                .json_body(json!({"reservationId": 42}));
            then.status(200);
        })
        .await;

    h.run(
        TaskType::SendEmailBooking,
        job(4, TaskType::SendEmailBooking, r#"{"reservationId":42.0}"#, 3),
    )
    .await;

    mock.assert_async().await;
    let reports = h.engine.reports();
    let Report::Complete(4, variables) = &reports[0] else {
        panic!("expected completion, got {:?}", reports);
    };
    assert_eq!(variables.get("sendEmailReservation"), Some(&json!("success")));
    assert_eq!(variables.get("reservationId"), Some(&json!(42.0)));
}

#[tokio::test]
async fn collaborator_timeout_fails_with_decremented_retries() {
    let h = Harness::start(Duration::from_millis(200)).await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/send-email");
            then.status(200).delay(Duration::from_secs(2));
        })
        .await;

    h.run(
        TaskType::SendEmailUnpaid,
        job(5, TaskType::SendEmailUnpaid, r#"{"reservationId":8}"#, 5),
    )
    .await;

    let reports = h.engine.reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(&reports[0], Report::Fail(5, 4, _)), "{:?}", reports);
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn unreadable_variables_fail_exactly_once() {
    let h = Harness::start(Duration::from_secs(5)).await;
    let mock = h
        .server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({"status": true}));
        })
        .await;

    h.run(TaskType::CheckBlacklist, job(6, TaskType::CheckBlacklist, "{oops", 3))
        .await;

    assert_eq!(mock.hits_async().await, 0);
    let reports = h.engine.reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(&reports[0], Report::Fail(6, 2, _)));
}

#[tokio::test]
async fn mistyped_input_fails_and_retries_saturate_at_zero() {
    let h = Harness::start(Duration::from_secs(5)).await;

    h.run(
        TaskType::SendEmailBooking,
        job(7, TaskType::SendEmailBooking, r#"{"reservationId":"forty-two"}"#, 0),
    )
    .await;

    let reports = h.engine.reports();
    match &reports[..] {
        [Report::Fail(7, 0, message)] => assert!(message.contains("reservationId")),
        other => panic!("expected one failure report, got {:?}", other),
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn same_input_yields_same_mutation() {
    let h = Harness::start(Duration::from_secs(5)).await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/check/blacklist");
            then.status(200).json_body(json!({"status": false}));
        })
        .await;

    let variables = r#"{"passengerId":"3201","name":"Syamsul"}"#;
    let first = h
        .run(TaskType::CheckBlacklist, job(8, TaskType::CheckBlacklist, variables, 3))
        .await;
    let second = h
        .run(TaskType::CheckBlacklist, job(8, TaskType::CheckBlacklist, variables, 3))
        .await;

    assert_eq!(first, second);
    let reports = h.engine.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0], reports[1]);
}

#[tokio::test]
async fn all_five_task_types_are_registered() {
    let h = Harness::start(Duration::from_secs(5)).await;
    let handlers = build_handlers(&TaskType::ALL, &h.regulation, &h.email);
    let names: Vec<_> = handlers.iter().map(|h| h.task_type().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "check-blacklist",
            "check-dukcapil",
            "check-pedulilindungi",
            "send-email-booking",
            "send-email-unpaid",
        ]
    );
}
