use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::error::{webhook_error_status, ApiError, FailureBody};
use crate::services::webhook_processor::{WebhookError, WebhookOutcome};

/// POST /api/webhook
///
/// The body is kept as raw bytes: signature verification runs over the exact
/// payload the processor signed, before any parsing.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("received webhook");

    let signature = match headers.get("Stripe-Signature").and_then(|v| v.to_str().ok()) {
        Some(signature) => signature,
        None => {
            warn!("missing webhook signature header");
            return ApiError::new(
                StatusCode::BAD_REQUEST,
                FailureBody::new("Invalid signature"),
            )
            .into_response();
        }
    };

    match state.webhooks.handle(&body, signature).await {
        Ok(WebhookOutcome::Updated(payment)) => {
            info!(payment_id = %payment.payment_id, status = %payment.status, "webhook processed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Ok(WebhookOutcome::Ignored { event_type }) => {
            info!(event_type = %event_type, "webhook acknowledged and ignored");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Ok(WebhookOutcome::SimulationSkipped { payment_id }) => {
            warn!(payment_id = %payment_id, "webhook update skipped by simulation flag");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(e @ WebhookError::Signature(_)) => {
            warn!(error = %e, "webhook signature verification failed");
            ApiError::new(
                webhook_error_status(&e),
                FailureBody::new("Invalid signature"),
            )
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            ApiError::new(
                webhook_error_status(&e),
                FailureBody::new("Error updating payment status"),
            )
            .into_response()
        }
    }
}
