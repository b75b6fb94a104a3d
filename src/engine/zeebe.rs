//! Zeebe gateway connection
//!
//! Thin adapter from `EngineClient` onto the generated `GatewayClient`.
//! The gRPC client is cheap to clone (it shares one HTTP/2 channel), so
//! each call clones it instead of locking.

use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use super::{ActivateJobsRequest, CreateInstanceRequest, EngineClient, InstanceResult, Job};
use crate::error::EngineError;
use crate::proto::gateway_protocol as pb;
use crate::proto::GatewayClient;
use crate::variables::ProcessVariables;

/// Client-side slack on top of the gateway's long-poll timeout.
const ACTIVATION_DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// gRPC connection to a Zeebe gateway.
#[derive(Debug, Clone)]
pub struct ZeebeConnection {
    client: GatewayClient<Channel>,
}

impl ZeebeConnection {
    /// Connect to `address` (`host:port`), with TLS unless `plaintext`.
    pub async fn connect(address: &str, plaintext: bool) -> Result<Self, EngineError> {
        let connect_err = |source: tonic::transport::Error| EngineError::Connect {
            address: address.to_string(),
            source,
        };

        let uri = endpoint_uri(address, plaintext);
        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|e| EngineError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(Duration::from_secs(10))
            .keep_alive_while_idle(true)
            .http2_keep_alive_interval(Duration::from_secs(45));

        if !plaintext {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(connect_err)?;
        }

        let channel = endpoint.connect().await.map_err(connect_err)?;

        tracing::info!(address, plaintext, "Connected to Zeebe gateway");

        Ok(Self {
            client: GatewayClient::new(channel),
        })
    }
}

fn endpoint_uri(address: &str, plaintext: bool) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        return address.to_string();
    }
    let scheme = if plaintext { "http" } else { "https" };
    format!("{}://{}", scheme, address)
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn job_from_proto(job: pb::ActivatedJob) -> Job {
    Job {
        key: job.key,
        task_type: job.r#type,
        retries: job.retries,
        variables: job.variables,
        process_instance_key: job.process_instance_key,
        bpmn_process_id: job.bpmn_process_id,
        element_id: job.element_id,
    }
}

#[async_trait]
impl EngineClient for ZeebeConnection {
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>, EngineError> {
        let rpc_err = |status| EngineError::Rpc {
            operation: "ActivateJobs",
            status,
        };

        let mut activate = tonic::Request::new(pb::ActivateJobsRequest {
            r#type: request.task_type.clone(),
            worker: request.worker.clone(),
            timeout: millis(request.job_timeout),
            max_jobs_to_activate: request.max_jobs,
            fetch_variable: Vec::new(),
            request_timeout: millis(request.request_timeout),
            tenant_ids: Vec::new(),
        });
        activate.set_timeout(request.request_timeout + ACTIVATION_DEADLINE_GRACE);

        let mut client = self.client.clone();
        let mut stream = client
            .activate_jobs(activate)
            .await
            .map_err(rpc_err)?
            .into_inner();

        let mut jobs = Vec::new();
        while let Some(batch) = stream.message().await.map_err(rpc_err)? {
            jobs.extend(batch.jobs.into_iter().map(job_from_proto));
        }
        Ok(jobs)
    }

    async fn complete_job(
        &self,
        job_key: i64,
        variables: &ProcessVariables,
    ) -> Result<(), EngineError> {
        let mut client = self.client.clone();
        client
            .complete_job(pb::CompleteJobRequest {
                job_key,
                variables: variables.to_document()?,
            })
            .await
            .map_err(|status| EngineError::Rpc {
                operation: "CompleteJob",
                status,
            })?;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_key: i64,
        retries: i32,
        error_message: &str,
        retry_backoff: Duration,
    ) -> Result<(), EngineError> {
        let mut client = self.client.clone();
        client
            .fail_job(pb::FailJobRequest {
                job_key,
                retries,
                error_message: error_message.to_string(),
                retry_back_off: millis(retry_backoff),
                variables: String::new(),
            })
            .await
            .map_err(|status| EngineError::Rpc {
                operation: "FailJob",
                status,
            })?;
        Ok(())
    }

    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<InstanceResult, EngineError> {
        let create = pb::CreateProcessInstanceRequest {
            process_definition_key: 0,
            bpmn_process_id: request.bpmn_process_id.clone(),
            version: request.version,
            variables: request.variables.to_document()?,
            tenant_id: String::new(),
        };

        let mut client = self.client.clone();
        match request.await_result {
            None => {
                let response = client
                    .create_process_instance(create)
                    .await
                    .map_err(|status| EngineError::Rpc {
                        operation: "CreateProcessInstance",
                        status,
                    })?
                    .into_inner();
                Ok(InstanceResult {
                    process_instance_key: response.process_instance_key,
                    bpmn_process_id: response.bpmn_process_id,
                    version: response.version,
                    variables: None,
                })
            }
            Some(timeout) => {
                let response = client
                    .create_process_instance_with_result(
                        pb::CreateProcessInstanceWithResultRequest {
                            request: Some(create),
                            request_timeout: millis(timeout),
                            fetch_variables: Vec::new(),
                        },
                    )
                    .await
                    .map_err(|status| EngineError::Rpc {
                        operation: "CreateProcessInstanceWithResult",
                        status,
                    })?
                    .into_inner();
                let variables = if response.variables.trim().is_empty() {
                    ProcessVariables::new()
                } else {
                    serde_json::from_str(&response.variables)?
                };
                Ok(InstanceResult {
                    process_instance_key: response.process_instance_key,
                    bpmn_process_id: response.bpmn_process_id,
                    version: response.version,
                    variables: Some(variables),
                })
            }
        }
    }
}
