//! JSON admin API for managing stubs and inspecting the request journal.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::journal::RecordedRequest;
use crate::state::SharedState;
use crate::stub::{RequestPattern, Stub};

pub const ADMIN_PREFIX: &str = "/__admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestCount {
    pub count: usize,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/__admin/mappings", get(list_mappings).post(create_mapping))
        .route("/__admin/mappings/{id}", delete(delete_mapping))
        .route("/__admin/reset", post(reset))
        .route("/__admin/requests", get(list_requests).delete(clear_requests))
        .route("/__admin/requests/count", post(count_requests))
        .with_state(state)
}

async fn list_mappings(State(state): State<SharedState>) -> Json<Vec<Stub>> {
    Json(state.stubs())
}

async fn create_mapping(
    State(state): State<SharedState>,
    Json(stub): Json<Stub>,
) -> Result<(StatusCode, Json<Stub>), (StatusCode, String)> {
    state
        .register(stub)
        .map(|stub| (StatusCode::CREATED, Json(stub)))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

async fn delete_mapping(State(state): State<SharedState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.remove(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn reset(State(state): State<SharedState>) -> StatusCode {
    state.reset();
    StatusCode::NO_CONTENT
}

async fn list_requests(State(state): State<SharedState>) -> Json<Vec<RecordedRequest>> {
    Json(state.requests())
}

async fn clear_requests(State(state): State<SharedState>) -> StatusCode {
    state.reset_requests();
    StatusCode::NO_CONTENT
}

async fn count_requests(
    State(state): State<SharedState>,
    Json(pattern): Json<RequestPattern>,
) -> Json<RequestCount> {
    Json(RequestCount {
        count: state.count_requests(&pattern),
    })
}
