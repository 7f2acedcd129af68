//! Shared test doubles for the store and processor seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::payment_repository::{NewPayment, Payment, PaymentStatus, PaymentStore};
use crate::processor::client::ProcessorClient;
use crate::processor::error::{ProcessorError, ProcessorResult};
use crate::processor::types::{
    CreateIntentParams, PaymentIntent, SIMULATE_WEBHOOK_FAILURE_KEY,
};

/// Store backed by a mutex-guarded vector, mirroring the Postgres
/// repository's contract (unique payment_id, update-by-correlation-key).
#[derive(Default)]
pub struct InMemoryPaymentStore {
    rows: Mutex<Vec<Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, payment_id: &str) -> Option<Payment> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id == payment_id)
            .cloned()
    }

    pub fn seed(&self, payment_id: &str, status: PaymentStatus) {
        let now = chrono::Utc::now();
        self.rows.lock().unwrap().push(Payment {
            id: Uuid::new_v4(),
            payment_id: payment_id.to_string(),
            status: status.as_str().to_string(),
            amount: 1000,
            currency: "usd".to_string(),
            name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            created_at: now,
            updated_at: now,
        });
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|p| p.payment_id == payment.payment_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                message: format!("duplicate payment_id: {}", payment.payment_id),
            }));
        }
        let now = chrono::Utc::now();
        let row = Payment {
            id: Uuid::new_v4(),
            payment_id: payment.payment_id,
            status: PaymentStatus::Created.as_str().to_string(),
            amount: payment.amount,
            currency: payment.currency,
            name: payment.name,
            email: payment.email,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        Ok(self.get(payment_id))
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status == status.as_str())
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| p.payment_id == payment_id)
            .ok_or_else(|| DatabaseError::not_found("Payment", payment_id))?;
        row.status = status.as_str().to_string();
        row.updated_at = chrono::Utc::now();
        Ok(row.clone())
    }
}

/// Processor double scripted per payment id.
#[derive(Default)]
pub struct ScriptedProcessor {
    /// Raw status returned by `retrieve_intent`, keyed by payment id.
    statuses: Mutex<HashMap<String, String>>,
    /// Ids whose `retrieve_intent` fails with a network error.
    fail_retrieve: Mutex<HashSet<String>>,
    create_error: Mutex<Option<ProcessorError>>,
    confirm_error: Mutex<Option<ProcessorError>>,
    next_intent_id: Mutex<String>,
    pub retrieve_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        let processor = Self::default();
        *processor.next_intent_id.lock().unwrap() = "pi_123".to_string();
        processor
    }

    pub fn with_intent_id(self, id: &str) -> Self {
        *self.next_intent_id.lock().unwrap() = id.to_string();
        self
    }

    pub fn set_status(&self, payment_id: &str, raw_status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), raw_status.to_string());
    }

    pub fn fail_retrieve_for(&self, payment_id: &str) {
        self.fail_retrieve
            .lock()
            .unwrap()
            .insert(payment_id.to_string());
    }

    pub fn fail_create(&self, error: ProcessorError) {
        *self.create_error.lock().unwrap() = Some(error);
    }

    pub fn fail_confirm(&self, error: ProcessorError) {
        *self.confirm_error.lock().unwrap() = Some(error);
    }

    pub fn retrieve_call_count(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorClient for ScriptedProcessor {
    async fn create_intent(&self, params: CreateIntentParams) -> ProcessorResult<PaymentIntent> {
        if let Some(err) = self.create_error.lock().unwrap().clone() {
            return Err(err);
        }
        let id = self.next_intent_id.lock().unwrap().clone();
        let mut metadata = HashMap::new();
        metadata.insert(
            SIMULATE_WEBHOOK_FAILURE_KEY.to_string(),
            params.simulate_webhook_failure.to_string(),
        );
        Ok(PaymentIntent {
            id,
            status: "requires_confirmation".to_string(),
            amount: params.amount,
            currency: params.currency,
            client_secret: Some("pi_secret".to_string()),
            metadata,
        })
    }

    async fn retrieve_intent(&self, payment_id: &str) -> ProcessorResult<PaymentIntent> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_retrieve.lock().unwrap().contains(payment_id) {
            return Err(ProcessorError::network("connection reset by peer"));
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .unwrap_or_else(|| "processing".to_string());
        Ok(PaymentIntent {
            id: payment_id.to_string(),
            status,
            amount: 1000,
            currency: "usd".to_string(),
            client_secret: None,
            metadata: HashMap::new(),
        })
    }

    async fn confirm_intent(
        &self,
        payment_id: &str,
        _payment_method_id: &str,
    ) -> ProcessorResult<PaymentIntent> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.confirm_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(PaymentIntent {
            id: payment_id.to_string(),
            status: "processing".to_string(),
            amount: 1000,
            currency: "usd".to_string(),
            client_secret: None,
            metadata: HashMap::new(),
        })
    }
}
