use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::processor::error::{ProcessorError, ProcessorErrorKind, ProcessorResult};
use crate::processor::types::{CreateIntentParams, PaymentIntent};

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Accepted age of a webhook timestamp, in seconds.
    pub webhook_tolerance_secs: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            base_url: "https://api.stripe.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            webhook_tolerance_secs: 300,
        }
    }
}

impl StripeConfig {
    pub fn from_env() -> ProcessorResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            ProcessorError::new(
                ProcessorErrorKind::InvalidRequest,
                "STRIPE_SECRET_KEY environment variable is required",
            )
        })?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            ProcessorError::new(
                ProcessorErrorKind::InvalidRequest,
                "STRIPE_WEBHOOK_SECRET environment variable is required",
            )
        })?;

        Ok(Self {
            base_url: std::env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            timeout_secs: std::env::var("STRIPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("STRIPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            webhook_tolerance_secs: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(300),
            secret_key,
            webhook_secret,
        })
    }
}

/// Boundary to the payment processor's intent API.
///
/// Implemented by [`StripeClient`] for real traffic; tests supply scripted
/// implementations.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn create_intent(&self, params: CreateIntentParams) -> ProcessorResult<PaymentIntent>;

    async fn retrieve_intent(&self, payment_id: &str) -> ProcessorResult<PaymentIntent>;

    async fn confirm_intent(
        &self,
        payment_id: &str,
        payment_method_id: &str,
    ) -> ProcessorResult<PaymentIntent>;
}

/// HTTP client for the Stripe payment-intent API.
///
/// Owns its credential; constructed once at startup and shared by reference.
pub struct StripeClient {
    config: StripeConfig,
    http: Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> ProcessorResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProcessorError::network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Issue one API request with bounded retries on rate limiting, server
    /// errors, and transport failures. Non-retryable API errors are parsed
    /// out of the processor's error envelope immediately.
    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        form: Option<&[(String, String)]>,
    ) -> ProcessorResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(&self.config.secret_key);
            if let Some(fields) = form {
                request = request.form(fields);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ProcessorError::network(format!("processor request failed: {}", e)));

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            ProcessorError::network(format!(
                                "invalid processor JSON response: {}",
                                e
                            ))
                        });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        if attempt < self.config.max_retries {
                            warn!(
                                status = %status,
                                attempt = attempt + 1,
                                "processor returned a transient error, retrying"
                            );
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                    }

                    return Err(parse_error_body(status.as_u16(), &text));
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProcessorError::network("processor request failed".to_string())))
    }
}

#[async_trait]
impl ProcessorClient for StripeClient {
    async fn create_intent(&self, params: CreateIntentParams) -> ProcessorResult<PaymentIntent> {
        let form = params.to_form();
        let intent: PaymentIntent = self
            .request(
                reqwest::Method::POST,
                &self.endpoint("/v1/payment_intents"),
                Some(&form),
            )
            .await?;
        info!(payment_id = %intent.id, amount = intent.amount, currency = %intent.currency, "payment intent created");
        Ok(intent)
    }

    async fn retrieve_intent(&self, payment_id: &str) -> ProcessorResult<PaymentIntent> {
        self.request(
            reqwest::Method::GET,
            &self.endpoint(&format!("/v1/payment_intents/{}", payment_id)),
            None,
        )
        .await
    }

    async fn confirm_intent(
        &self,
        payment_id: &str,
        payment_method_id: &str,
    ) -> ProcessorResult<PaymentIntent> {
        let form = vec![(
            "payment_method".to_string(),
            payment_method_id.to_string(),
        )];
        self.request(
            reqwest::Method::POST,
            &self.endpoint(&format!("/v1/payment_intents/{}/confirm", payment_id)),
            Some(&form),
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
}

/// Turn a non-success API response into a tagged [`ProcessorError`].
fn parse_error_body(status: u16, body: &str) -> ProcessorError {
    match serde_json::from_str::<StripeErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status));
            let mut err = ProcessorError::from_api_type(
                envelope.error.error_type.as_deref().unwrap_or(""),
                message,
            );
            if let Some(code) = envelope.error.decline_code {
                err = err.with_decline_code(code);
            }
            err
        }
        Err(_) => ProcessorError::network(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_error_envelope_maps_to_card_declined() {
        let body = r#"{"error":{"type":"card_error","message":"Your card was declined.","code":"card_declined","decline_code":"insufficient_funds"}}"#;
        let err = parse_error_body(402, body);
        assert_eq!(err.kind, ProcessorErrorKind::CardDeclined);
        assert_eq!(err.message, "Your card was declined.");
        assert_eq!(err.decline_code.as_deref(), Some("insufficient_funds"));
    }

    #[test]
    fn invalid_request_envelope_maps_to_invalid_request() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"Invalid currency: xx"}}"#;
        let err = parse_error_body(400, body);
        assert_eq!(err.kind, ProcessorErrorKind::InvalidRequest);
        assert!(err.decline_code.is_none());
    }

    #[test]
    fn unparseable_body_becomes_unknown_error() {
        let err = parse_error_body(500, "<html>bad gateway</html>");
        assert_eq!(err.kind, ProcessorErrorKind::Unknown);
        assert!(err.message.contains("HTTP 500"));
    }

    #[test]
    fn client_builds_with_default_config() {
        let client = StripeClient::new(StripeConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: "whsec_test".to_string(),
            ..Default::default()
        });
        assert!(client.is_ok());
    }
}
