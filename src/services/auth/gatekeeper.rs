//! Edge authentication: classify → validate → enrich.
//!
//! Every request is consumed by value and, when admitted, rebuilt with the
//! trust headers. Nothing here is shared-mutable; one `Gatekeeper` serves all
//! in-flight requests.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, header},
};

use crate::error::AppError;
use crate::services::auth::exemption::{ExemptionSet, is_canonical};
use crate::services::auth::verifier::{Claims, CredentialVerifier, VerifyError};

pub const X_AUTH_USERNAME: HeaderName = HeaderName::from_static("x-auth-username");
pub const X_AUTH_ROLE: HeaderName = HeaderName::from_static("x-auth-role");

const BEARER_PREFIX: &str = "Bearer ";

pub struct Gatekeeper {
    exemptions: ExemptionSet,
    verifier: Arc<dyn CredentialVerifier>,
    verify_timeout: Duration,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("exemptions", &self.exemptions)
            .field("verify_timeout", &self.verify_timeout)
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    pub fn new(
        exemptions: ExemptionSet,
        verifier: Arc<dyn CredentialVerifier>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            exemptions,
            verifier,
            verify_timeout,
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exemptions.is_exempt(path)
    }

    /// Validate the `Authorization` header and return verified claims.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AppError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::MissingCredential)?;

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .ok_or(AppError::MalformedCredential)?;

        match tokio::time::timeout(self.verify_timeout, self.verifier.verify(token)).await {
            Ok(Ok(claims)) => Ok(claims),
            Ok(Err(VerifyError::Invalid(reason))) => {
                tracing::warn!(%reason, "access token verification failed");
                Err(AppError::InvalidCredential)
            }
            Ok(Err(VerifyError::Unavailable(reason))) => {
                tracing::error!(%reason, "credential verifier unavailable");
                Err(AppError::VerifierUnavailable)
            }
            Err(_elapsed) => {
                tracing::error!(
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    "credential verification timed out"
                );
                Err(AppError::VerifierUnavailable)
            }
        }
    }

    /// Run one request through the gate. `Ok` is the request to forward,
    /// `Err` is the rejection to send back instead.
    pub async fn admit(&self, req: Request<Body>) -> Result<Request<Body>, AppError> {
        let (mut parts, body) = req.into_parts();

        // Client-asserted identity never passes, exempt path or not.
        strip_trust_headers(&mut parts.headers);

        // Classification and forwarding both use the raw path, so it has to be
        // the path the upstream will resolve.
        if !is_canonical(parts.uri.path()) {
            tracing::info!(path = %parts.uri.path(), "request rejected: non-canonical path");
            return Err(AppError::InvalidPath);
        }

        if self.is_exempt(parts.uri.path()) {
            tracing::debug!(path = %parts.uri.path(), "exempt path, skipping authentication");
            return Ok(Request::from_parts(parts, body));
        }

        let claims = match self.authenticate(&parts.headers).await {
            Ok(claims) => claims,
            Err(err) => {
                tracing::info!(
                    path = %parts.uri.path(),
                    code = err.code(),
                    "request rejected"
                );
                return Err(err);
            }
        };

        let (username, role) = trust_header_values(&claims)?;
        parts.headers.insert(X_AUTH_USERNAME, username);
        parts.headers.insert(X_AUTH_ROLE, role);
        parts.extensions.insert(claims);

        Ok(Request::from_parts(parts, body))
    }
}

fn strip_trust_headers(headers: &mut HeaderMap) {
    headers.remove(X_AUTH_USERNAME);
    headers.remove(X_AUTH_ROLE);
}

// A principal or role that cannot travel as a header value is not something
// the issuer would have produced.
fn trust_header_values(claims: &Claims) -> Result<(HeaderValue, HeaderValue), AppError> {
    let username = HeaderValue::from_str(&claims.principal);
    let role = HeaderValue::from_str(&claims.role);
    match (username, role) {
        (Ok(username), Ok(role)) => Ok((username, role)),
        _ => {
            tracing::warn!("verified claims are not valid header values");
            Err(AppError::InvalidCredential)
        }
    }
}
