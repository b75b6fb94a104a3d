//! FWW Workflow worker
//!
//! Registers the reservation job workers against the engine and serves the
//! process starter.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fww_workflow::{
    collaborator::{EmailClient, RegulationClient},
    config::StartupInstanceConfig,
    engine::CreateInstanceRequest,
    handlers::build_handlers,
    starter::{self, StarterState},
    worker::relay_shutdown,
    EngineClient, JobCompletionReporter, ProcessVariables, WorkerSettings, WorkflowWorkerConfig,
    ZeebeConnection,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fww_workflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkflowWorkerConfig::load().context("Failed to load worker configuration")?;
    tracing::info!(
        engine = %config.engine.address,
        plaintext = config.engine.plaintext,
        workers = config.workers.len(),
        "Configuration loaded"
    );

    let connection = ZeebeConnection::connect(&config.engine.address, config.engine.plaintext)
        .await
        .context("Failed to connect to the workflow engine")?;
    let engine: Arc<dyn EngineClient> = Arc::new(connection);

    if let Some(startup) = &config.startup_instance {
        start_startup_instance(engine.as_ref(), startup).await;
    }

    let collaborator_timeout = config.collaborators.request_timeout();
    let regulation =
        RegulationClient::new(&config.collaborators.regulation_base_url, collaborator_timeout)
            .context("Failed to build regulation client")?;
    let email = EmailClient::new(&config.collaborators.email_base_url, collaborator_timeout)
        .context("Failed to build email client")?;

    let reporter = JobCompletionReporter::new(
        engine.clone(),
        config.engine.report_retry,
        config.engine.fail_retry_backoff(),
    );
    let settings = WorkerSettings::from_config(config.worker_name(), &config.engine);
    tracing::info!(worker = %settings.worker_name, "Registering job workers");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handlers = build_handlers(&config.workers, &regulation, &email);
    let workers = fww_workflow::spawn_workers(
        engine.clone(),
        handlers,
        reporter,
        settings,
        shutdown_rx.clone(),
    );

    let state = StarterState::new(engine, config.starter.clone(), config.workers.clone());
    let app = starter::router(state).layer(TraceLayer::new_for_http());

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Process starter listening");

    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    });

    tokio::spawn(relay_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    server.await.context("HTTP server failed")?;

    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Job worker task panicked");
        }
    }
    tracing::info!("All job workers stopped");
    Ok(())
}

/// Create the one-shot instance configured to run at boot. Failure is logged
/// and the workers keep running.
async fn start_startup_instance(engine: &dyn EngineClient, startup: &StartupInstanceConfig) {
    let request = CreateInstanceRequest::latest(
        startup.bpmn_process_id.clone(),
        ProcessVariables::from(startup.variables.clone()),
    );
    match engine.create_instance(&request).await {
        Ok(result) => tracing::info!(
            bpmn_process_id = %result.bpmn_process_id,
            process_instance_key = result.process_instance_key,
            "Startup process instance created"
        ),
        Err(e) => tracing::warn!(
            bpmn_process_id = %startup.bpmn_process_id,
            error = %e,
            "Failed to create startup process instance"
        ),
    }
}
