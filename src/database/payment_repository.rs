use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Local payment lifecycle.
///
/// `Created` is the only non-terminal state. `Succeeded` and `Failed` are
/// terminal: no transition out of them is defined, and re-writing the same
/// terminal value is a safe no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(PaymentStatus::Created),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Created)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment entity
///
/// `payment_id` is the processor-assigned intent id and the external
/// correlation key for webhook and polling updates; it is written atomically
/// with the first insert and carries a uniqueness constraint.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub payment_id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields required to persist a new payment; status is always `created`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub email: String,
}

/// Narrow store seam for payment rows.
///
/// Every operation touches at most one row; the reconciliation engine is the
/// only writer after the initial insert.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    async fn find_by_payment_id(&self, payment_id: &str)
        -> Result<Option<Payment>, DatabaseError>;

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, DatabaseError>;

    async fn update_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, DatabaseError>;
}

/// Postgres-backed payment repository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentRepository {
    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (payment_id, status, amount, currency, name, email)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, payment_id, status, amount, currency, name, email, created_at, updated_at",
        )
        .bind(&payment.payment_id)
        .bind(PaymentStatus::Created.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.name)
        .bind(&payment.email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, payment_id, status, amount, currency, name, email, created_at, updated_at
             FROM payments
             WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, payment_id, status, amount, currency, name, email, created_at, updated_at
             FROM payments
             WHERE status = $1
             ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = $2, updated_at = NOW()
             WHERE payment_id = $1
             RETURNING id, payment_id, status, amount, currency, name, email, created_at, updated_at",
        )
        .bind(payment_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Payment", payment_id))
    }
}
