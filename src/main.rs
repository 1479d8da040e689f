use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use edupay_backend::api::{self, AppState};
use edupay_backend::checkout::CheckoutService;
use edupay_backend::config::Config;
use edupay_backend::database::course_repository::CourseRepository;
use edupay_backend::database::enrollment_repository::EnrollmentRepository;
use edupay_backend::database::payment_repository::PaymentRepository;
use edupay_backend::database::{self, PoolConfig};
use edupay_backend::gateway::GatewayClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting edupay backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Gateway merchant: {}", config.gateway.merchant_code);
    tracing::info!("Purchasing enabled: {}", config.gateway.purchasing_enabled);

    // Database pool
    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await?;

    // Gateway client and checkout service
    let gateway = Arc::new(GatewayClient::new(config.gateway.clone())?);
    let service = Arc::new(CheckoutService::new(
        config.gateway.clone(),
        gateway,
        Arc::new(PaymentRepository::new(pool.clone())),
        Arc::new(CourseRepository::new(pool.clone())),
        Arc::new(EnrollmentRepository::new(pool.clone())),
    ));

    let state = AppState {
        service,
        pool,
        environment: config.server.environment.clone(),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/payments", post(api::payments::create_payment))
        .route("/api/payments/return", get(api::payments::payment_return))
        .route("/api/payments/:id/status", get(api::payments::payment_status))
        .route("/api/payments/:id/confirm", post(api::payments::confirm_payment))
        .route("/api/payments/:id/refund", post(api::payments::request_refund))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
