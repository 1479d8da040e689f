//! HTTP surface

pub mod health;
pub mod payments;

use std::sync::Arc;

use sqlx::PgPool;

use crate::checkout::CheckoutService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CheckoutService>,
    pub pool: PgPool,
    pub environment: String,
}
