// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod error;
pub mod matcher;
pub mod protocol;
pub mod questions;
pub mod state;
pub mod timer;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Full HTTP + WebSocket application
pub fn app(state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
