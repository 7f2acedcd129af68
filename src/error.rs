//! API failure bodies and status mapping.
//!
//! Every failed call answers with the same JSON shape:
//! `{"status":"failed","errorMessage":...}`, optionally extended with the
//! payment context the caller submitted. The core returns typed errors; this
//! module is the one place they become transport responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::payment_service::PaymentServiceError;
use crate::services::webhook_processor::WebhookError;

/// Generic message for failed status lookups; deliberately vague so internal
/// detail never leaks to callers.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub status: &'static str,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(flatten)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl FailureBody {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            status: "failed",
            error_message: error_message.into(),
            context: serde_json::Map::new(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: FailureBody,
}

impl ApiError {
    pub fn new(status: StatusCode, body: FailureBody) -> Self {
        Self { status, body }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                error = %self.body.error_message,
                "request failed"
            );
        } else {
            tracing::warn!(
                status = self.status.as_u16(),
                error = %self.body.error_message,
                "request rejected"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

/// HTTP status for a reconciliation-engine failure.
///
/// Processor rejections are the caller's 400 (a declined card is not a
/// server fault); unknown payments are 404; store failures are 500.
pub fn service_error_status(err: &PaymentServiceError) -> StatusCode {
    match err {
        PaymentServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
        PaymentServiceError::Processor(_) => StatusCode::BAD_REQUEST,
        PaymentServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        PaymentServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP status for a webhook-handling failure.
pub fn webhook_error_status(err: &WebhookError) -> StatusCode {
    match err {
        WebhookError::Signature(_) => StatusCode::BAD_REQUEST,
        WebhookError::Payload(_) => StatusCode::BAD_REQUEST,
        WebhookError::Update(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::error::{ProcessorError, ProcessorErrorKind};
    use crate::processor::webhook::SignatureError;

    #[test]
    fn failure_body_serializes_with_camel_case_error_key() {
        let body = FailureBody::new("Stripe error");
        let json = serde_json::to_value(&body).expect("serialization should succeed");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["errorMessage"], "Stripe error");
    }

    #[test]
    fn failure_body_context_is_flattened() {
        let mut context = serde_json::Map::new();
        context.insert("paymentId".to_string(), serde_json::json!("pi_123"));
        context.insert("amount".to_string(), serde_json::json!(1000));
        let body = FailureBody::new("declined").with_context(context);
        let json = serde_json::to_value(&body).expect("serialization should succeed");
        assert_eq!(json["paymentId"], "pi_123");
        assert_eq!(json["amount"], 1000);
    }

    #[test]
    fn service_errors_map_to_expected_statuses() {
        let declined = PaymentServiceError::Processor(ProcessorError::new(
            ProcessorErrorKind::CardDeclined,
            "declined",
        ));
        assert_eq!(service_error_status(&declined), StatusCode::BAD_REQUEST);

        let missing = PaymentServiceError::NotFound {
            payment_id: "pi_1".to_string(),
        };
        assert_eq!(service_error_status(&missing), StatusCode::NOT_FOUND);
    }

    #[test]
    fn webhook_errors_map_to_expected_statuses() {
        assert_eq!(
            webhook_error_status(&WebhookError::Signature(SignatureError::Mismatch)),
            StatusCode::BAD_REQUEST
        );
        let update = WebhookError::Update(PaymentServiceError::Processor(
            ProcessorError::network("timeout"),
        ));
        assert_eq!(
            webhook_error_status(&update),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
