//! Socket server setup
//!
//! Router, CORS, and the run loop.

mod handler;
mod state;

pub use handler::socket_handler;
pub use state::RelayState;

use crate::connection::ConnectionManager;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use relay_common::{AppConfig, AppError, CorsConfig};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the relay router
pub fn create_router() -> Router<RelayState> {
    Router::new()
        .route("/socket", get(socket_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: RelayState) -> Router {
    let cors = cors_layer(&state.config().cors);

    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from the configured origin list
///
/// Origins that fail to parse as header values are skipped with a warning
/// rather than refusing to start.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
}

/// Run the relay server on an already-built app
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::transport(format!("Failed to bind to {addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::transport(e.to_string()))?;
    tracing::info!("Relay listening on ws://{local}/socket");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::transport(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete relay server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.socket.address();

    let manager = ConnectionManager::new_shared();
    let state = RelayState::new(manager, config);
    let app = create_app(state);

    run_server(app, &addr).await
}
