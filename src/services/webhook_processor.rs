//! Webhook ingestion: authenticate, filter, and feed the update path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::database::payment_repository::Payment;
use crate::processor::webhook::{self, SignatureError};
use crate::services::payment_service::{PaymentService, PaymentServiceError};

#[derive(Debug)]
pub enum WebhookOutcome {
    /// A recognized event drove the update path to completion.
    Updated(Payment),
    /// The event type is not one we act on; acknowledged and dropped.
    Ignored { event_type: String },
    /// The intent asked for a simulated missed webhook; acknowledged, the
    /// sweeper will reconcile the payment later.
    SimulationSkipped { payment_id: String },
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid webhook payload: {0}")]
    Payload(String),

    #[error("error updating payment status: {0}")]
    Update(#[source] PaymentServiceError),
}

pub struct WebhookProcessor {
    service: Arc<PaymentService>,
    signing_secret: String,
    tolerance_secs: u64,
}

impl WebhookProcessor {
    pub fn new(service: Arc<PaymentService>, signing_secret: String, tolerance_secs: u64) -> Self {
        Self {
            service,
            signing_secret,
            tolerance_secs,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        webhook::verify_signature(
            payload,
            signature_header,
            &self.signing_secret,
            self.tolerance_secs,
        )?;

        let event = webhook::parse_event(payload)
            .map_err(|e| WebhookError::Payload(e.to_string()))?;

        if !event.is_recognized() {
            info!(event_type = %event.event_type, "ignoring webhook event type");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let intent = event.data.object;
        info!(event_type = %event.event_type, payment_id = %intent.id, "processing webhook");

        if intent.simulate_webhook_failure() {
            warn!(
                payment_id = %intent.id,
                "webhook simulation failure enabled, skipping update"
            );
            return Ok(WebhookOutcome::SimulationSkipped {
                payment_id: intent.id,
            });
        }

        let payment = self
            .service
            .update_payment_status(&intent.id)
            .await
            .map_err(WebhookError::Update)?;

        Ok(WebhookOutcome::Updated(payment))
    }
}
