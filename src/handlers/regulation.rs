//! Regulation checks: blacklist, dukcapil (residency) and pedulilindungi
//! (travel pass).

use async_trait::async_trait;
use serde_json::Value;

use super::{JobHandler, TaskType};
use crate::collaborator::{RegulationCheck, RegulationClient};
use crate::error::HandlerError;
use crate::variables::{PassengerInput, ProcessVariables};

/// Runs one regulation check for the instance's passenger.
pub struct RegulationCheckHandler {
    check: RegulationCheck,
    client: RegulationClient,
}

impl RegulationCheckHandler {
    pub fn new(check: RegulationCheck, client: RegulationClient) -> Self {
        Self { check, client }
    }
}

#[async_trait]
impl JobHandler for RegulationCheckHandler {
    fn task_type(&self) -> TaskType {
        match self.check {
            RegulationCheck::Blacklist => TaskType::CheckBlacklist,
            RegulationCheck::Dukcapil => TaskType::CheckDukcapil,
            RegulationCheck::PeduliLindungi => TaskType::CheckPedulilindungi,
        }
    }

    fn output_variable(&self) -> &'static str {
        match self.check {
            RegulationCheck::Blacklist => "blacklistUser",
            RegulationCheck::Dukcapil => "dukcapil",
            RegulationCheck::PeduliLindungi => "peduliLindungi",
        }
    }

    async fn derive(&self, variables: &ProcessVariables) -> Result<Value, HandlerError> {
        let input = PassengerInput::from_variables(variables)?;

        // Blacklist answers a flag, the other two a status string.
        let status = match self.check {
            RegulationCheck::Blacklist => Value::Bool(
                self.client
                    .check::<bool>(self.check, &input.passenger_id)
                    .await?
                    .status,
            ),
            RegulationCheck::Dukcapil | RegulationCheck::PeduliLindungi => Value::String(
                self.client
                    .check::<String>(self.check, &input.passenger_id)
                    .await?
                    .status,
            ),
        };

        tracing::info!(
            check = self.check.path_segment(),
            status = %status,
            "Regulation check answered"
        );
        Ok(status)
    }
}
