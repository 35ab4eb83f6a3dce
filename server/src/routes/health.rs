//! Liveness endpoints.
//!
//! Engines poll `/health` to decide whether the contacts API is reachable;
//! any 2xx counts.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Contacts currently held in memory
    pub contacts: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        contacts: state.contacts.len(),
    })
}

/// Plain-text route listing.
async fn index() -> &'static str {
    concat!(
        "Offsync Contacts API\n",
        "  GET    /api/contacts\n",
        "  GET    /api/contacts/{id}\n",
        "  POST   /api/contacts\n",
        "  PUT    /api/contacts/{id}\n",
        "  DELETE /api/contacts/{id}\n",
        "  POST   /api/contacts/random\n",
    )
}
