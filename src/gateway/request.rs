//! Redirect-URL construction for payment initiation
//!
//! Builds the full signed parameter set for one payment attempt and
//! renders it as the URL the buyer is redirected to. Pure given the
//! configuration and a clock value; the caller supplies `now` so the
//! expiry window is testable.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};

use super::signer;
use super::types::{format_gateway_time, payment_window, InitiateRequest};
use super::verify::SECURE_HASH_FIELD;

/// Protocol version spoken with the processor
pub const VERSION: &str = "2.1.0";
/// Merchandise category code sent with every order
pub const ORDER_TYPE: &str = "other";

/// Build the signed redirect URL: canonical query over the full
/// parameter set, HMAC appended last and never part of its own input.
pub fn build_payment_url(
    config: &GatewayConfig,
    request: &InitiateRequest,
    now: DateTime<Utc>,
) -> AppResult<String> {
    if request.amount_minor <= 0 {
        return Err(AppError::validation(format!(
            "payment amount must be positive, got {}",
            request.amount_minor
        )));
    }
    if request.order_reference.is_empty() {
        return Err(AppError::validation("order reference cannot be empty"));
    }

    let amount = request.amount_minor.to_string();
    let create_date = format_gateway_time(now);
    let expire_date = format_gateway_time(now + payment_window());

    let mut params: Vec<(&str, &str)> = vec![
        ("vnp_Version", VERSION),
        ("vnp_Command", "pay"),
        ("vnp_TmnCode", &config.merchant_code),
        ("vnp_Locale", &config.locale),
        ("vnp_CurrCode", &config.currency),
        ("vnp_TxnRef", &request.order_reference),
        ("vnp_OrderInfo", &request.order_info),
        ("vnp_OrderType", ORDER_TYPE),
        ("vnp_Amount", &amount),
        ("vnp_ReturnUrl", &config.return_url),
        ("vnp_IpAddr", &request.client_ip),
        ("vnp_CreateDate", &create_date),
        ("vnp_ExpireDate", &expire_date),
    ];
    if let Some(bank_code) = request.bank_code.as_deref() {
        params.push(("vnp_BankCode", bank_code));
    }

    let query = signer::canonical_query(params);
    let hash = signer::hmac_sha512_hex(query.as_bytes(), config.hash_secret.as_bytes());

    debug!(
        order_reference = %request.order_reference,
        amount_minor = request.amount_minor,
        "built payment redirect url"
    );

    Ok(format!(
        "{}?{}&{}={}",
        config.pay_url, query, SECURE_HASH_FIELD, hash
    ))
}
