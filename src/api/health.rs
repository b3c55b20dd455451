/*
 * Responsibility
 * - GET /actuator/health (liveness check of the gateway itself)
 * - Exempt from authentication via the default exemption set
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "UP"})))
}
