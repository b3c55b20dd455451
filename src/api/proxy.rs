/*
 * Responsibility
 * - Fallback handler: every admitted request that is not served locally
 *   goes to the upstream service that owns its path prefix
 */
use axum::{body::Body, extract::State, http::Request, response::Response};

use crate::error::AppError;
use crate::state::AppState;

pub async fn forward(State(state): State<AppState>, req: Request<Body>) -> Result<Response, AppError> {
    Ok(state.upstream.forward(req).await?)
}
