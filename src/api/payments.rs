//! Payment endpoints
//!
//! `POST /api/payments` initiates a purchase and returns the redirect
//! URL; `GET /api/payments/return` is the processor's redirect target;
//! the remaining routes are operator-facing reconciliation tools.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::checkout::types::{PaymentCreated, ReturnOutcome, StatusView};
use crate::error::AppError;
use crate::gateway::types::GatewayResponse;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub bank_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundBody {
    /// Operator login recorded with the processor
    pub initiated_by: String,
}

pub async fn create_payment(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<(StatusCode, Json<PaymentCreated>), AppError> {
    let created = state
        .service
        .create_payment_request(
            body.user_id,
            body.course_id,
            body.bank_code,
            addr.ip().to_string(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The processor redirects the buyer here after payment; the same
/// parameters may also arrive as a server-side webhook. Either way
/// delivery is at-least-once and is handled idempotently.
pub async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ReturnOutcome>, AppError> {
    let outcome = state.service.handle_return(&params).await?;
    Ok(Json(outcome))
}

pub async fn payment_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<StatusView>, AppError> {
    let view = state
        .service
        .query_payment_status(payment_id, addr.ip().to_string())
        .await?;
    Ok(Json(view))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ReturnOutcome>, AppError> {
    let outcome = state
        .service
        .confirm_pending(payment_id, addr.ip().to_string())
        .await?;
    Ok(Json(outcome))
}

pub async fn request_refund(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<RefundBody>,
) -> Result<Json<GatewayResponse>, AppError> {
    let response = state
        .service
        .request_refund(payment_id, body.initiated_by, addr.ip().to_string())
        .await?;
    Ok(Json(response))
}
