//! Service-level request and result types

use serde::Serialize;
use uuid::Uuid;

use crate::database::payment_repository::PaymentStatus;

/// Result of initiating a purchase
#[derive(Debug, Clone, Serialize)]
pub struct PaymentCreated {
    pub payment_id: Uuid,
    pub order_reference: String,
    /// Where to send the buyer to complete payment
    pub redirect_url: String,
}

/// Result of reconciling a return callback (or an administrative
/// confirmation). Partial enrollment failure is reported here as
/// `enrollment_created: false` with a terminal status, not as an
/// error.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub order_reference: String,
    pub status: PaymentStatus,
    pub response_code: Option<String>,
    pub enrollment_created: bool,
    pub message: String,
}

/// The processor's live answer about a transaction, or an explicit
/// "unknown" when the processor could not be reached. Never collapsed
/// into success or failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LiveStatus {
    Reported {
        response_code: String,
        transaction_status: Option<String>,
        message: String,
    },
    Unknown {
        reason: String,
    },
}

/// Recorded state plus the processor's live view of one payment
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub payment_id: Uuid,
    pub order_reference: String,
    pub recorded_status: PaymentStatus,
    pub response_code: Option<String>,
    pub live: LiveStatus,
}
