//! Payment processor integration
//!
//! Everything that touches the processor's wire format lives here:
//! canonical signing, redirect-URL construction, return-callback
//! verification and the out-of-band query/refund API. The rest of the
//! application talks to the processor through the [`PaymentGateway`]
//! trait so tests can substitute a double.

pub mod client;
pub mod codes;
pub mod request;
pub mod signer;
pub mod types;
pub mod verify;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AppResult;
use self::types::{GatewayResponse, InitiateRequest, RefundRequest, StatusQuery};

pub use self::client::GatewayClient;

/// Interface to the payment processor.
///
/// URL building and callback verification are pure given the
/// configured secret; `query_status` and `refund` perform outbound
/// calls. None of these mutate payment records.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Build the signed redirect URL for one payment attempt
    fn payment_url(&self, request: &InitiateRequest) -> AppResult<String>;

    /// Authenticate an inbound return callback
    fn verify_return(&self, params: &HashMap<String, String>) -> bool;

    /// Ask the processor for a transaction's authoritative status
    async fn query_status(&self, query: &StatusQuery) -> AppResult<GatewayResponse>;

    /// Request a refund for a settled transaction
    async fn refund(&self, request: &RefundRequest) -> AppResult<GatewayResponse>;
}
