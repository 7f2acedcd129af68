//! Payment reconciliation engine.
//!
//! All three update triggers (confirmation follow-up, webhook delivery, the
//! polling sweeper) converge on [`PaymentService::update_payment_status`], so
//! the processor-status classification is defined exactly once.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::database::error::DatabaseError;
use crate::database::payment_repository::{NewPayment, Payment, PaymentStatus, PaymentStore};
use crate::processor::client::ProcessorClient;
use crate::processor::error::ProcessorError;
use crate::processor::types::{CreateIntentParams, INTENT_STATUS_SUCCEEDED};

pub type ServiceResult<T> = Result<T, PaymentServiceError>;

#[derive(Debug, Error)]
pub enum PaymentServiceError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("payment not found: {payment_id}")]
    NotFound { payment_id: String },

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PaymentServiceError {
    fn validation(message: impl Into<String>, field: &str) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

/// Inputs for payment creation, already transport-agnostic.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub payment_method_id: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub email: String,
    pub simulate_webhook_failure: bool,
}

/// Collapse the processor's raw intent status into the local two-valued
/// terminal model: `succeeded` iff the processor reports exactly
/// "succeeded"; every other raw status, including intermediate ones like
/// "processing" or "requires_action", classifies as `failed`.
pub fn classify_intent_status(raw_status: &str) -> PaymentStatus {
    if raw_status == INTENT_STATUS_SUCCEEDED {
        PaymentStatus::Succeeded
    } else {
        PaymentStatus::Failed
    }
}

pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    processor: Arc<dyn ProcessorClient>,
    min_amount: i64,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        processor: Arc<dyn ProcessorClient>,
        min_amount: i64,
    ) -> Self {
        Self {
            store,
            processor,
            min_amount,
        }
    }

    /// Create a payment intent at the processor and persist the local record.
    ///
    /// The store write happens only after the processor accepted the intent:
    /// a creation failure leaves no orphan row behind.
    pub async fn create_payment(&self, request: CreatePaymentRequest) -> ServiceResult<Payment> {
        self.validate_create(&request)?;

        info!(
            payment_method_id = %request.payment_method_id,
            amount = request.amount,
            currency = %request.currency,
            "creating payment intent"
        );

        let intent = self
            .processor
            .create_intent(CreateIntentParams {
                amount: request.amount,
                currency: request.currency.clone(),
                receipt_email: request.email.clone(),
                description: format!("Payment from {}", request.name),
                simulate_webhook_failure: request.simulate_webhook_failure,
            })
            .await?;

        let payment = self
            .store
            .insert(NewPayment {
                payment_id: intent.id,
                amount: intent.amount,
                currency: intent.currency,
                name: request.name,
                email: request.email,
            })
            .await?;

        info!(
            payment_id = %payment.payment_id,
            amount = payment.amount,
            currency = %payment.currency,
            "payment saved"
        );

        Ok(payment)
    }

    /// Submit confirmation for an intent with the given payment method.
    ///
    /// Deliberately does not touch the store: the confirmation outcome at the
    /// processor may not be terminal yet, and the authoritative status is
    /// always learned through a subsequent retrieve (update, webhook, poll).
    pub async fn confirm_payment(
        &self,
        payment_id: &str,
        payment_method_id: &str,
    ) -> ServiceResult<()> {
        info!(
            payment_id = %payment_id,
            payment_method_id = %payment_method_id,
            "confirming payment"
        );

        self.processor.retrieve_intent(payment_id).await?;
        self.processor
            .confirm_intent(payment_id, payment_method_id)
            .await?;
        Ok(())
    }

    /// Pull the authoritative intent state and merge it into the local record.
    ///
    /// Idempotent: re-running against an unchanged processor status writes
    /// the same value. Never creates a record; an unknown id is a correlation
    /// bug and surfaces as [`PaymentServiceError::NotFound`].
    pub async fn update_payment_status(&self, payment_id: &str) -> ServiceResult<Payment> {
        info!(payment_id = %payment_id, "updating payment status");

        let intent = self.processor.retrieve_intent(payment_id).await?;

        let existing = self
            .store
            .find_by_payment_id(payment_id)
            .await?
            .ok_or_else(|| PaymentServiceError::NotFound {
                payment_id: payment_id.to_string(),
            })?;

        let status = classify_intent_status(&intent.status);
        let updated = self.store.update_status(&existing.payment_id, status).await?;

        info!(
            payment_id = %updated.payment_id,
            status = %updated.status,
            raw_status = %intent.status,
            "payment status updated"
        );

        Ok(updated)
    }

    /// Read the locally persisted record; never calls the processor.
    pub async fn get_payment_status(&self, payment_id: &str) -> ServiceResult<Payment> {
        self.store
            .find_by_payment_id(payment_id)
            .await?
            .ok_or_else(|| PaymentServiceError::NotFound {
                payment_id: payment_id.to_string(),
            })
    }

    /// All payments still awaiting a terminal classification.
    pub async fn pending_payments(&self) -> ServiceResult<Vec<Payment>> {
        Ok(self.store.find_by_status(PaymentStatus::Created).await?)
    }

    fn validate_create(&self, request: &CreatePaymentRequest) -> ServiceResult<()> {
        if request.payment_method_id.trim().is_empty() {
            return Err(PaymentServiceError::validation(
                "payment method id is required",
                "paymentMethodId",
            ));
        }
        if request.amount < self.min_amount {
            return Err(PaymentServiceError::validation(
                format!("amount should be at least {} minor units", self.min_amount),
                "amount",
            ));
        }
        if request.currency.trim().len() != 3 {
            return Err(PaymentServiceError::validation(
                "currency should be a valid 3-letter ISO code",
                "currency",
            ));
        }
        if request.name.trim().is_empty() {
            return Err(PaymentServiceError::validation(
                "name is required",
                "name",
            ));
        }
        if !email_regex().is_match(request.email.trim()) {
            return Err(PaymentServiceError::validation(
                "email should be valid",
                "email",
            ));
        }
        Ok(())
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern compiles")
    })
}
