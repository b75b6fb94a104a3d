//! Reservation emails: booking confirmation and unpaid reminder.

use async_trait::async_trait;
use serde_json::Value;

use super::{JobHandler, TaskType};
use crate::collaborator::EmailClient;
use crate::error::HandlerError;
use crate::variables::{ProcessVariables, ReservationInput};

/// Value written to the output variable once the email service accepts.
pub const EMAIL_SENT: &str = "success";

/// Which reservation email to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailNotification {
    Booking,
    Unpaid,
}

/// Asks the email service to notify the reservation's owner.
pub struct SendEmailHandler {
    notification: EmailNotification,
    client: EmailClient,
}

impl SendEmailHandler {
    pub fn new(notification: EmailNotification, client: EmailClient) -> Self {
        Self {
            notification,
            client,
        }
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    fn task_type(&self) -> TaskType {
        match self.notification {
            EmailNotification::Booking => TaskType::SendEmailBooking,
            EmailNotification::Unpaid => TaskType::SendEmailUnpaid,
        }
    }

    fn output_variable(&self) -> &'static str {
        match self.notification {
            EmailNotification::Booking => "sendEmailReservation",
            EmailNotification::Unpaid => "sendEmail",
        }
    }

    async fn derive(&self, variables: &ProcessVariables) -> Result<Value, HandlerError> {
        let input = ReservationInput::from_variables(variables)?;

        self.client.send(input.reservation_id).await?;

        tracing::info!(
            reservation_id = input.reservation_id,
            notification = ?self.notification,
            "Reservation email sent"
        );
        Ok(Value::String(EMAIL_SENT.to_string()))
    }
}
