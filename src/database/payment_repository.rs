//! Payment persistence
//!
//! One row per purchase attempt. Rows are created `pending`, moved
//! exactly once into a terminal state by settlement, and never
//! deleted: they are the financial audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::{error as log_error, info, warn};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};

/// Lifecycle of one payment attempt.
///
/// Transitions only move forward:
/// `pending → completed | failed | cancelled`,
/// `completed_enrollment_failed` when money moved but the enrollment
/// insert raised, `refunded` via the out-of-band refund flow. Every
/// non-pending state is terminal for the callback handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    CompletedEnrollmentFailed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::CompletedEnrollmentFailed => "completed_enrollment_failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// A terminal payment must never be touched by another callback
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "completed_enrollment_failed" => Ok(PaymentStatus::CompletedEnrollmentFailed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    /// Caller-visible correlation key shared with the processor
    pub order_reference: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// Amount in minor currency units
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    /// Processor-assigned transaction number, set by the callback
    pub transaction_no: Option<String>,
    /// Raw processor response code, preserved for diagnostics
    pub response_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a pending payment row
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_reference: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
}

/// The terminal facts a callback (or administrative confirmation)
/// carries into settlement.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Target state: `Completed` or `Failed`
    pub status: PaymentStatus,
    pub transaction_no: Option<String>,
    pub response_code: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// What settlement did with the row
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The payment was already terminal; nothing was written
    AlreadyTerminal(Payment),
    /// The transition was applied
    Applied {
        payment: Payment,
        enrollment_created: bool,
    },
}

/// Persistence boundary for payments.
///
/// `settle` owns the whole atomic unit of state update + enrollment
/// insert so a reader can never observe `completed` without either an
/// enrollment row or the explicit degraded marker.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_pending(&self, new: NewPayment) -> DbResult<Payment>;

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>>;

    async fn find_by_order_reference(&self, order_reference: &str) -> DbResult<Option<Payment>>;

    /// True when a pending payment exists for the (user, course) pair
    async fn has_pending(&self, user_id: Uuid, course_id: Uuid) -> DbResult<bool>;

    /// Apply a terminal transition under a row lock. Returns `None`
    /// for an unknown order reference. On a `Completed` settlement the
    /// enrollment insert happens in the same transaction; if that
    /// insert raises, the payment is recorded
    /// `completed_enrollment_failed` instead of being rolled back to
    /// `pending` or marked `failed`.
    async fn settle(&self, order_reference: &str, settlement: Settlement)
        -> DbResult<Option<SettleOutcome>>;
}

const PAYMENT_COLUMNS: &str = "id, order_reference, user_id, course_id, amount_cents, currency, \
     payment_method, status, transaction_no, response_code, paid_at, created_at, updated_at";

/// Postgres-backed payment store
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert_pending(&self, new: NewPayment) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (id, order_reference, user_id, course_id, amount_cents, currency, payment_method, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending') \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.order_reference)
        .bind(new.user_id)
        .bind(new.course_id)
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(&new.payment_method)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_order_reference(&self, order_reference: &str) -> DbResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_reference = $1"
        ))
        .bind(order_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn has_pending(&self, user_id: Uuid, course_id: Uuid) -> DbResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE user_id = $1 AND course_id = $2 AND status = 'pending')",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn settle(
        &self,
        order_reference: &str,
        settlement: Settlement,
    ) -> DbResult<Option<SettleOutcome>> {
        if !matches!(
            settlement.status,
            PaymentStatus::Completed | PaymentStatus::Failed
        ) {
            return Err(DatabaseError::new(DatabaseErrorKind::TransactionError {
                message: format!(
                    "settlement target must be completed or failed, got {}",
                    settlement.status.as_str()
                ),
            }));
        }

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        // Row lock: two near-simultaneous callback deliveries for the
        // same order reference serialize here, the loser observes the
        // terminal state the winner wrote.
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_reference = $1 FOR UPDATE"
        ))
        .bind(order_reference)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(payment) = payment else {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(None);
        };

        if payment.status.is_terminal() {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            info!(
                order_reference,
                status = payment.status.as_str(),
                "settlement skipped, payment already terminal"
            );
            return Ok(Some(SettleOutcome::AlreadyTerminal(payment)));
        }

        let updated = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments \
             SET status = $2, transaction_no = $3, response_code = $4, paid_at = $5, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(settlement.status.as_str())
        .bind(&settlement.transaction_no)
        .bind(&settlement.response_code)
        .bind(settlement.paid_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if settlement.status != PaymentStatus::Completed {
            tx.commit().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(Some(SettleOutcome::Applied {
                payment: updated,
                enrollment_created: false,
            }));
        }

        let enrollment_result = sqlx::query(
            "INSERT INTO enrollments (id, user_id, course_id) VALUES ($1, $2, $3)",
        )
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(payment.course_id)
        .execute(&mut *tx)
        .await;

        match enrollment_result {
            Ok(_) => {
                tx.commit().await.map_err(DatabaseError::from_sqlx)?;
                Ok(Some(SettleOutcome::Applied {
                    payment: updated,
                    enrollment_created: true,
                }))
            }
            Err(e) => {
                // Financial success must not be lost: roll the failed
                // transaction back and record the degraded state with
                // a fresh conditional write.
                let insert_error = DatabaseError::from_sqlx(e);
                warn!(
                    order_reference,
                    error = %insert_error,
                    "enrollment insert failed during settlement"
                );
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;

                let flagged = sqlx::query_as::<_, Payment>(&format!(
                    "UPDATE payments \
                     SET status = 'completed_enrollment_failed', transaction_no = $2, \
                         response_code = $3, paid_at = $4, updated_at = NOW() \
                     WHERE id = $1 AND status = 'pending' \
                     RETURNING {PAYMENT_COLUMNS}"
                ))
                .bind(payment.id)
                .bind(&settlement.transaction_no)
                .bind(&settlement.response_code)
                .bind(settlement.paid_at)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

                match flagged {
                    Some(p) => {
                        log_error!(
                            order_reference,
                            payment_id = %p.id,
                            user_id = %p.user_id,
                            course_id = %p.course_id,
                            "payment completed but enrollment was NOT created; manual repair required"
                        );
                        Ok(Some(SettleOutcome::Applied {
                            payment: p,
                            enrollment_created: false,
                        }))
                    }
                    None => {
                        // Lost the race after rollback: someone else
                        // settled the row. Report what they wrote.
                        let current = self
                            .find_by_order_reference(order_reference)
                            .await?
                            .ok_or_else(|| {
                                DatabaseError::new(DatabaseErrorKind::NotFound {
                                    entity: "Payment".to_string(),
                                    id: order_reference.to_string(),
                                })
                            })?;
                        Ok(Some(SettleOutcome::AlreadyTerminal(current)))
                    }
                }
            }
        }
    }
}
