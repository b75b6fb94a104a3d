//! Request/response DTOs of the regulation and email services.

use serde::{Deserialize, Serialize};

/// Which regulation check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegulationCheck {
    Blacklist,
    Dukcapil,
    PeduliLindungi,
}

impl RegulationCheck {
    /// Path segment under `/check/`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Blacklist => "blacklist",
            Self::Dukcapil => "dukcapil",
            Self::PeduliLindungi => "pedulilindungi",
        }
    }

    pub fn path(&self) -> String {
        format!("/check/{}", self.path_segment())
    }
}

/// Body of every regulation check: the passenger's KTP (identity card) number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KtpRequest {
    pub ktp: String,
}

/// Regulation check verdict.
///
/// The blacklist service answers with a boolean, the residency and
/// travel-pass services with a status string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulationResponse<T> {
    pub status: T,
}

/// Body of the email service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub reservation_id: i64,
}
