use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key carried on every intent; when the webhook ingestor sees it
/// set to the literal string "true" it skips the status update to simulate a
/// missed webhook delivery.
pub const SIMULATE_WEBHOOK_FAILURE_KEY: &str = "simulate_webhook_failure";

/// Raw status string the processor reports for a fully captured intent.
pub const INTENT_STATUS_SUCCEEDED: &str = "succeeded";

/// Processor-side payment intent snapshot.
///
/// `status` stays a raw string: the processor's lifecycle has more states
/// than the local model, and collapsing happens in one place downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn simulate_webhook_failure(&self) -> bool {
        self.metadata
            .get(SIMULATE_WEBHOOK_FAILURE_KEY)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

/// Inputs for intent creation.
#[derive(Debug, Clone)]
pub struct CreateIntentParams {
    pub amount: i64,
    pub currency: String,
    pub receipt_email: String,
    pub description: String,
    pub simulate_webhook_failure: bool,
}

impl CreateIntentParams {
    /// Render the form-encoded body the intent-creation endpoint expects.
    pub fn to_form(&self) -> Vec<(String, String)> {
        vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("receipt_email".to_string(), self.receipt_email.clone()),
            ("description".to_string(), self.description.clone()),
            ("payment_method_types[]".to_string(), "card".to_string()),
            (
                format!("metadata[{}]", SIMULATE_WEBHOOK_FAILURE_KEY),
                self.simulate_webhook_failure.to_string(),
            ),
        ]
    }
}
