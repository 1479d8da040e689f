//! Out-of-band processor API client
//!
//! Status queries and refunds go directly to the processor's
//! transaction API rather than through the buyer's browser. Both are
//! reconciliation tools: they never mutate payment rows here, the
//! caller decides what to do with the answer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};

use super::request::{build_payment_url, VERSION};
use super::signer;
use super::types::{
    format_gateway_time, GatewayResponse, InitiateRequest, RefundRequest, StatusQuery,
};
use super::verify::{self, SECURE_HASH_FIELD};
use super::PaymentGateway;

/// Concrete processor client. Configuration is immutable for the
/// lifetime of the client; construct one at startup and inject it.
pub struct GatewayClient {
    config: GatewayConfig,
    http: Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::upstream(format!("failed to build http client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Sign the parameter set and POST it to the transaction API.
    async fn post_signed(
        &self,
        command: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> AppResult<GatewayResponse> {
        let hash = signer::sign(
            params.iter().map(|(k, v)| (*k, v.as_str())),
            self.config.hash_secret.as_bytes(),
        );
        params.push((SECURE_HASH_FIELD, hash));

        let response = self
            .http
            .post(&self.config.api_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(command, "processor call timed out");
                    AppError::upstream(format!("{command} request timed out"))
                } else {
                    warn!(command, error = %e, "processor call failed");
                    AppError::upstream(format!("{command} request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(command, %status, "processor returned http error");
            return Err(AppError::upstream(format!(
                "{command} request returned HTTP {status}"
            )));
        }

        response
            .json::<GatewayResponse>()
            .await
            .map_err(|e| AppError::upstream(format!("invalid {command} response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    fn payment_url(&self, request: &InitiateRequest) -> AppResult<String> {
        build_payment_url(&self.config, request, Utc::now())
    }

    fn verify_return(&self, params: &HashMap<String, String>) -> bool {
        verify::verify_return(params, self.config.hash_secret.as_bytes())
    }

    async fn query_status(&self, query: &StatusQuery) -> AppResult<GatewayResponse> {
        info!(
            order_reference = %query.order_reference,
            "querying processor for transaction status"
        );

        let now = format_gateway_time(Utc::now());
        let params: Vec<(&'static str, String)> = vec![
            ("vnp_RequestId", Uuid::new_v4().simple().to_string()),
            ("vnp_Version", VERSION.to_string()),
            ("vnp_Command", "querydr".to_string()),
            ("vnp_TmnCode", self.config.merchant_code.clone()),
            ("vnp_TxnRef", query.order_reference.clone()),
            (
                "vnp_OrderInfo",
                format!("Status query for {}", query.order_reference),
            ),
            (
                "vnp_TransactionDate",
                format_gateway_time(query.transaction_date),
            ),
            ("vnp_CreateDate", now),
            ("vnp_IpAddr", query.client_ip.clone()),
        ];

        let response = self.post_signed("querydr", params).await?;
        info!(
            order_reference = %query.order_reference,
            response_code = %response.response_code,
            transaction_status = ?response.transaction_status,
            "processor status query answered"
        );
        Ok(response)
    }

    async fn refund(&self, request: &RefundRequest) -> AppResult<GatewayResponse> {
        info!(
            order_reference = %request.order_reference,
            amount_minor = request.amount_minor,
            initiated_by = %request.initiated_by,
            "requesting refund from processor"
        );

        let now = format_gateway_time(Utc::now());
        let mut params: Vec<(&'static str, String)> = vec![
            ("vnp_RequestId", Uuid::new_v4().simple().to_string()),
            ("vnp_Version", VERSION.to_string()),
            ("vnp_Command", "refund".to_string()),
            ("vnp_TmnCode", self.config.merchant_code.clone()),
            // 02 = full refund of a settled transaction
            ("vnp_TransactionType", "02".to_string()),
            ("vnp_TxnRef", request.order_reference.clone()),
            ("vnp_Amount", request.amount_minor.to_string()),
            (
                "vnp_OrderInfo",
                format!("Refund for {}", request.order_reference),
            ),
            (
                "vnp_TransactionDate",
                format_gateway_time(request.transaction_date),
            ),
            ("vnp_CreateBy", request.initiated_by.clone()),
            ("vnp_CreateDate", now),
            ("vnp_IpAddr", request.client_ip.clone()),
        ];
        if let Some(transaction_no) = &request.transaction_no {
            params.push(("vnp_TransactionNo", transaction_no.clone()));
        }

        let response = self.post_signed("refund", params).await?;
        info!(
            order_reference = %request.order_reference,
            response_code = %response.response_code,
            "processor refund request answered"
        );
        Ok(response)
    }
}
