//! Offsync Server - reference contacts API for the offsync engine.
//!
//! Serves one in-memory `contacts` collection over REST plus a `/health`
//! endpoint the engine's reachability probe polls.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use crate::db::ContactRepository;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub contacts: Arc<ContactRepository>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            contacts: Arc::new(ContactRepository::new()),
            config: Arc::new(config),
        }
    }
}

/// Build the router with tracing and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
