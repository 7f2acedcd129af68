use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{error, info};

use crate::api::AppState;
use crate::error::{service_error_status, ApiError, FailureBody, GENERIC_ERROR_MESSAGE};
use crate::services::payment_service::{CreatePaymentRequest, PaymentServiceError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApiRequest {
    pub payment_method_id: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub simulate_webhook_failure: bool,
}

impl PaymentApiRequest {
    fn to_service_request(&self) -> CreatePaymentRequest {
        CreatePaymentRequest {
            payment_method_id: self.payment_method_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            simulate_webhook_failure: self.simulate_webhook_failure,
        }
    }

    /// Failure body carrying the submitted payment context for diagnostics.
    fn failure_context(&self, payment_id: Option<&str>) -> serde_json::Map<String, serde_json::Value> {
        let mut context = serde_json::Map::new();
        if let Some(id) = payment_id {
            context.insert("paymentId".to_string(), serde_json::json!(id));
        }
        context.insert("amount".to_string(), serde_json::json!(self.amount));
        context.insert("currency".to_string(), serde_json::json!(self.currency));
        context.insert("name".to_string(), serde_json::json!(self.name));
        context.insert("email".to_string(), serde_json::json!(self.email));
        context
    }
}

/// POST /api/payments
///
/// Creates the payment and immediately attempts confirmation. A confirmation
/// failure leaves the row `created`; reconciliation converges it later via
/// webhook or sweeper.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentApiRequest>,
) -> Response {
    let payment = match state.payments.create_payment(request.to_service_request()).await {
        Ok(payment) => payment,
        Err(e) => {
            error!(error = %e, "payment creation failed");
            return ApiError::new(
                service_error_status(&e),
                FailureBody::new(e.to_string()).with_context(request.failure_context(None)),
            )
            .into_response();
        }
    };

    if let Err(e) = state
        .payments
        .confirm_payment(&payment.payment_id, &request.payment_method_id)
        .await
    {
        error!(payment_id = %payment.payment_id, error = %e, "payment confirmation failed");
        let status = match &e {
            PaymentServiceError::Processor(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &e {
            PaymentServiceError::Processor(processor_err) => processor_err.message.clone(),
            other => other.to_string(),
        };
        return ApiError::new(
            status,
            FailureBody::new(message)
                .with_context(request.failure_context(Some(&payment.payment_id))),
        )
        .into_response();
    }

    info!(payment_id = %payment.payment_id, "payment created and confirmation submitted");
    (StatusCode::OK, Json(payment)).into_response()
}

/// GET /api/payments/{payment_id}
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Response {
    match state.payments.get_payment_status(&payment_id).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(e) => {
            error!(payment_id = %payment_id, error = %e, "payment status lookup failed");
            ApiError::new(
                service_error_status(&e),
                FailureBody::new(GENERIC_ERROR_MESSAGE),
            )
            .into_response()
        }
    }
}
