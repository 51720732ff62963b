//! Router assembly and listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::session::ConnectionManager;
use crate::web::handlers;

pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub started: Instant,
}

pub fn router(manager: Arc<ConnectionManager>) -> Router {
    let state = Arc::new(AppState {
        manager,
        started: Instant::now(),
    });
    Router::new()
        .route("/", get(handlers::index))
        .route("/offer", post(handlers::offer))
        .route("/api/status", get(handlers::status))
        .route("/api/devices", get(handlers::devices))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: &ServerConfig, manager: Arc<ConnectionManager>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.http_port)
        .parse()
        .map_err(|e: std::net::AddrParseError| Error::Config(e.to_string()))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "signaling endpoint listening");
    axum::serve(listener, router(manager)).await?;
    Ok(())
}
