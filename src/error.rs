/*
 * Responsibility
 * - Gateway-wide AppError definition
 * - IntoResponse (HTTP status / JSON error body)
 * - Rejection reasons are short and machine-safe; internal detail only goes to the log
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or malformed bearer credential")]
    MissingCredential,
    #[error("missing or malformed bearer credential")]
    MalformedCredential,
    #[error("invalid or expired credential")]
    InvalidCredential,
    #[error("credential verification unavailable")]
    VerifierUnavailable,

    #[error("invalid request path")]
    InvalidPath,
    #[error("no route for path")]
    RouteNotFound,
    #[error("upstream unavailable")]
    BadGateway,
    #[error("upstream timed out")]
    GatewayTimeout,

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential
            | AppError::MalformedCredential
            | AppError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AppError::VerifierUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidPath => StatusCode::BAD_REQUEST,
            AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::BadGateway => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "MISSING_CREDENTIAL",
            AppError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AppError::InvalidCredential => "INVALID_CREDENTIAL",
            AppError::VerifierUnavailable => "VERIFIER_UNAVAILABLE",
            AppError::InvalidPath => "INVALID_PATH",
            AppError::RouteNotFound => "ROUTE_NOT_FOUND",
            AppError::BadGateway => "BAD_GATEWAY",
            AppError::GatewayTimeout => "GATEWAY_TIMEOUT",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        let mut res = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}
