//! Contacts resource routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use offsync_engine::Record;
use serde_json::Value;

use crate::error::Result;
use crate::handlers;
use crate::AppState;

/// Create contact routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/contacts", get(list_handler).post(create_handler))
        .route("/api/contacts/random", post(random_handler))
        .route(
            "/api/contacts/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

/// GET /api/contacts
async fn list_handler(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(handlers::list_contacts(&state.contacts))
}

/// GET /api/contacts/{id}
async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    Ok(Json(handlers::get_contact(&state.contacts, &id)?))
}

/// POST /api/contacts
async fn create_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>)> {
    let Json(body) = body?;
    let record = handlers::create_contact(&state.contacts, body)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/contacts/{id}
async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>> {
    let Json(body) = body?;
    Ok(Json(handlers::update_contact(&state.contacts, &id, body)?))
}

/// DELETE /api/contacts/{id}
async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    handlers::delete_contact(&state.contacts, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contacts/random
async fn random_handler(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(handlers::generate_contacts(
        &state.contacts,
        state.config.batch_size,
    ))
}
