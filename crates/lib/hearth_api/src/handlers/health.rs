//! Health endpoint.

use axum::Json;
use serde_json::{Value, json};

/// `GET /api/health`: liveness probe.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "code": 200,
        "message": "API is healthy.",
        "data": {},
    }))
}
