//! Typed parameter sets for each processor request kind
//!
//! The processor's API is a flat string-keyed form, but inside the
//! application every request kind is a closed struct; conversion to
//! the wire map happens only at the signing boundary.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Wire timestamp format required by the processor
pub const GATEWAY_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// The processor renders all timestamps in UTC+7 regardless of the
/// merchant's locale.
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

fn gateway_offset() -> FixedOffset {
    FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS).expect("fixed offset is in range")
}

/// Render a timestamp in the processor's required format
pub fn format_gateway_time(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&gateway_offset())
        .format(GATEWAY_TIME_FORMAT)
        .to_string()
}

/// Parse a processor timestamp back to UTC. Returns `None` for
/// anything that does not match the wire format.
pub fn parse_gateway_time(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, GATEWAY_TIME_FORMAT).ok()?;
    gateway_offset()
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// How long a generated payment URL stays valid
pub fn payment_window() -> Duration {
    Duration::minutes(15)
}

/// Parse a decimal amount in major currency units ("49.99") into
/// integer minor units (4999). Integer math only; fractional input
/// beyond two decimal places or negative input is rejected.
pub fn parse_major_units(raw: &str) -> AppResult<i64> {
    let s = raw.trim();
    if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
        return Err(AppError::validation(format!("invalid amount '{raw}'")));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty()
        || frac.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AppError::validation(format!("invalid amount '{raw}'")));
    }

    let whole: i64 = whole
        .parse()
        .map_err(|_| AppError::validation(format!("amount '{raw}' out of range")))?;
    let mut cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| AppError::validation("bad amount"))? * 10,
        _ => frac.parse::<i64>().map_err(|_| AppError::validation("bad amount"))?,
    };
    cents += whole
        .checked_mul(100)
        .ok_or_else(|| AppError::validation(format!("amount '{raw}' out of range")))?;
    Ok(cents)
}

/// One outgoing payment initiation
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub order_reference: String,
    /// Amount in minor currency units
    pub amount_minor: i64,
    pub order_info: String,
    pub client_ip: String,
    /// Pre-selected bank, sent only when the buyer chose one
    pub bank_code: Option<String>,
}

/// Authenticated fields of the processor's return callback.
///
/// Built from the raw query map after signature verification; the raw
/// map is what gets verified, this struct is what the rest of the
/// code consumes.
#[derive(Debug, Clone)]
pub struct ReturnCallback {
    pub order_reference: String,
    pub response_code: String,
    pub transaction_no: Option<String>,
    pub transaction_status: Option<String>,
    pub amount_minor: Option<i64>,
    pub bank_code: Option<String>,
    pub bank_transaction_no: Option<String>,
    pub card_type: Option<String>,
    pub order_info: Option<String>,
    pub merchant_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl ReturnCallback {
    /// Extract the typed callback from the raw query parameters.
    /// Only the correlation key and the response code are mandatory;
    /// everything else is informational.
    pub fn from_params(params: &HashMap<String, String>) -> AppResult<Self> {
        let required = |key: &str| -> AppResult<String> {
            params
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| AppError::validation(format!("callback is missing {key}")))
        };
        let optional = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            order_reference: required("vnp_TxnRef")?,
            response_code: required("vnp_ResponseCode")?,
            transaction_no: optional("vnp_TransactionNo"),
            transaction_status: optional("vnp_TransactionStatus"),
            amount_minor: optional("vnp_Amount").and_then(|v| v.parse().ok()),
            bank_code: optional("vnp_BankCode"),
            bank_transaction_no: optional("vnp_BankTranNo"),
            card_type: optional("vnp_CardType"),
            order_info: optional("vnp_OrderInfo"),
            merchant_code: optional("vnp_TmnCode"),
            paid_at: optional("vnp_PayDate").and_then(|v| parse_gateway_time(&v)),
        })
    }
}

/// Out-of-band status query for one transaction
#[derive(Debug, Clone)]
pub struct StatusQuery {
    pub order_reference: String,
    /// When the original transaction was created, per our records
    pub transaction_date: DateTime<Utc>,
    pub client_ip: String,
}

/// Out-of-band refund request
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_reference: String,
    /// Amount to refund, in minor currency units
    pub amount_minor: i64,
    /// Processor-assigned transaction number from the callback
    pub transaction_no: Option<String>,
    pub transaction_date: DateTime<Utc>,
    /// Operator login requesting the refund, for the processor's audit
    pub initiated_by: String,
    pub client_ip: String,
}

/// Response body of the processor's query/refund API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "vnp_ResponseCode")]
    pub response_code: String,
    #[serde(rename = "vnp_Message", default)]
    pub message: Option<String>,
    #[serde(rename = "vnp_TxnRef", default)]
    pub order_reference: Option<String>,
    #[serde(rename = "vnp_Amount", default)]
    pub amount: Option<String>,
    #[serde(rename = "vnp_TransactionNo", default)]
    pub transaction_no: Option<String>,
    #[serde(rename = "vnp_TransactionStatus", default)]
    pub transaction_status: Option<String>,
    #[serde(rename = "vnp_PayDate", default)]
    pub pay_date: Option<String>,
}

impl GatewayResponse {
    /// True when the query itself succeeded and the transaction is
    /// reported as settled.
    pub fn is_settled(&self) -> bool {
        self.response_code == super::codes::SUCCESS_CODE
            && self.transaction_status.as_deref() == Some(super::codes::SUCCESS_CODE)
    }
}
