//! Outbound HTTP collaborators
//!
//! - `RegulationClient`: blacklist, dukcapil (residency) and
//!   pedulilindungi (travel pass) checks
//! - `EmailClient`: reservation notification emails

pub mod client;
pub mod types;

pub use client::{EmailClient, RegulationClient};
pub use types::{EmailRequest, KtpRequest, RegulationCheck, RegulationResponse};
