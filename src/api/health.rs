//! Liveness endpoint

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};

/// Liveness response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

/// Is the relay running?
async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Backend is running".to_string(),
    })
}

/// Build the liveness router
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/", get(status))
}
