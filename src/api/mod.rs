pub mod payments;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;

use crate::services::payment_service::PaymentService;
use crate::services::webhook_processor::WebhookProcessor;

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub webhooks: Arc<WebhookProcessor>,
    pub db_pool: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(crate::health::health))
        .route("/api/payments", post(payments::create_payment))
        .route(
            "/api/payments/{payment_id}",
            get(payments::get_payment_status),
        )
        .route("/api/webhook", post(webhooks::handle_webhook))
        .with_state(state)
}
