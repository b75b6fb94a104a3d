//! HTTP clients for the regulation and email services
//!
//! Both clients wrap one `reqwest::Client` built with an explicit timeout,
//! so a hung collaborator surfaces as `CollaboratorError::Timeout` instead
//! of pinning a job forever.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{EmailRequest, KtpRequest, RegulationCheck, RegulationResponse};
use crate::error::CollaboratorError;

fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// RegulationClient
// ---------------------------------------------------------------------------

/// Client for `POST /check/{kind}`.
#[derive(Debug, Clone)]
pub struct RegulationClient {
    client: Client,
    base_url: String,
}

impl RegulationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Run one regulation check for a KTP number.
    pub async fn check<T>(
        &self,
        check: RegulationCheck,
        ktp: &str,
    ) -> Result<RegulationResponse<T>, CollaboratorError>
    where
        T: DeserializeOwned,
    {
        let url = join_url(&self.base_url, &check.path());
        let body = KtpRequest {
            ktp: ktp.to_string(),
        };

        tracing::debug!(url = %url, check = check.path_segment(), "Calling regulation service");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_send(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<RegulationResponse<T>>()
            .await
            .map_err(|e| CollaboratorError::from_decode(&url, e))
    }
}

// ---------------------------------------------------------------------------
// EmailClient
// ---------------------------------------------------------------------------

/// Client for `POST /send-email`. Only the status code matters.
#[derive(Debug, Clone)]
pub struct EmailClient {
    client: Client,
    base_url: String,
}

impl EmailClient {
    pub const PATH: &'static str = "/send-email";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub async fn send(&self, reservation_id: i64) -> Result<(), CollaboratorError> {
        let url = join_url(&self.base_url, Self::PATH);

        tracing::debug!(url = %url, reservation_id, "Calling email service");

        let response = self
            .client
            .post(&url)
            .json(&EmailRequest { reservation_id })
            .send()
            .await
            .map_err(|e| CollaboratorError::from_send(&url, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CollaboratorError::Status {
                url,
                status: status.as_u16(),
            })
        }
    }
}
