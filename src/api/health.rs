use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database_ok: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let version = env!("CARGO_PKG_VERSION").to_string();
    let database_ok = database::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        version,
        environment: state.environment.clone(),
        database_ok,
    })
}
