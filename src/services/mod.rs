//! Services module for business logic

pub mod payment_service;
pub mod webhook_processor;

pub use payment_service::{PaymentService, PaymentServiceError};
pub use webhook_processor::{WebhookError, WebhookOutcome, WebhookProcessor};
