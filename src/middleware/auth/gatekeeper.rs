//! Edge authentication middleware.
//!
//! Runs ahead of every route. Exempt paths go straight through; everything
//! else needs `Authorization: Bearer <jwt>`. Admitted requests reach the router
//! carrying `X-Auth-Username` / `X-Auth-Role`, rejected ones never do.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Put the gatekeeper in front of `router`.
///
/// Apply it after the routes are assembled so it wraps all of them:
/// ```ignore
/// let router = Router::new().route(...).fallback(...);
/// let router = middleware::auth::gatekeeper::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, gatekeeper_middleware))
}

async fn gatekeeper_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let req = state.gatekeeper.admit(req).await?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    use axum::{
        http::{StatusCode, header},
        routing::get,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::{VerificationKey, default_exempt_paths};
    use crate::services::auth::{
        Gatekeeper, JwtVerifier,
        exemption::{ExemptionSet, MatchMode},
        verifier::test_support,
    };
    use crate::services::proxy::{RouteTable, Upstream};

    // Echoes the identity the backend would see.
    async fn whoami(req: Request<Body>) -> String {
        let h = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        format!("{}|{}", h("x-auth-username"), h("x-auth-role"))
    }

    fn app_with(mode: MatchMode) -> Router {
        let verifier = JwtVerifier::new(
            &VerificationKey::Secret(test_support::SECRET.into()),
            None,
            None,
            0,
        )
        .unwrap();
        let gatekeeper = Gatekeeper::new(
            ExemptionSet::new(default_exempt_paths(mode).iter().copied(), mode),
            Arc::new(verifier),
            Duration::from_secs(1),
        );
        let state = AppState::new(
            Arc::new(gatekeeper),
            Upstream::new(RouteTable::new([]), Duration::from_secs(1)),
        );

        let router = Router::new()
            .route("/actuator/health", get(|| async { "up" }))
            .fallback(whoami);
        apply(router, state.clone()).with_state(state)
    }

    fn app() -> Router {
        app_with(MatchMode::Contains)
    }

    async fn send(app: Router, path: &str, headers: &[(&str, &str)]) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let res = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn protected_path_without_header_is_401() {
        let res = app()
            .oneshot(Request::builder().uri("/api/orders").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "error": { "code": "MISSING_CREDENTIAL",
                               "message": "missing or malformed bearer credential" } })
        );
    }

    #[tokio::test]
    async fn login_path_without_header_passes_through() {
        let (status, body) = send(app(), "/api/auth/login", &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "-|-");
    }

    #[tokio::test]
    async fn health_check_needs_no_credential() {
        let (status, body) = send(app(), "/actuator/health", &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "up");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_401() {
        let (status, _) = send(app(), "/api/orders", &[("authorization", "Basic YWxpY2U6cHc=")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_backend_with_identity() {
        let bearer = format!("Bearer {}", test_support::token("alice", "CUSTOMER"));
        let (status, body) = send(
            app(),
            "/api/orders",
            &[
                ("authorization", bearer.as_str()),
                ("x-auth-username", "root"),
                ("x-auth-role", "ADMIN"),
            ],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice|CUSTOMER");
    }

    #[tokio::test]
    async fn tampered_token_never_reaches_backend() {
        let forged = test_support::sign_with(
            "attacker-chosen-secret",
            &json!({ "sub": "alice", "role": "ADMIN", "exp": test_support::now() + 600 }),
        );
        let bearer = format!("Bearer {forged}");
        let (status, body) = send(app(), "/api/orders", &[("authorization", bearer.as_str())]).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.contains('|'));
        assert!(body.contains("invalid or expired credential"));
    }

    #[tokio::test]
    async fn spoofed_identity_on_open_path_is_dropped() {
        let (status, body) = send(
            app(),
            "/api/users/register",
            &[("x-auth-username", "root"), ("x-auth-role", "ADMIN")],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "-|-");
    }

    #[tokio::test]
    async fn segment_mode_closes_the_substring_hole() {
        let (status, _) = send(app(), "/api/orders/actuator-report", &[]).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(app_with(MatchMode::Segment), "/api/orders/actuator-report", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn segment_mode_only_matches_from_the_path_start() {
        for path in ["/api/payments/7/actuator", "/api/orders/auth/x"] {
            let (status, body) = send(app_with(MatchMode::Segment), path, &[]).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
            assert!(!body.contains('|'), "{path}");
        }
    }

    #[tokio::test]
    async fn dot_segment_path_is_400_and_never_reaches_backend() {
        for mode in [MatchMode::Contains, MatchMode::Segment] {
            for path in ["/api/users/register/../42", "/api/users/register/%2E%2E/42"] {
                let (status, body) = send(app_with(mode), path, &[]).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{mode} {path}");
                assert!(body.contains("INVALID_PATH"), "{mode} {path}");
                assert!(!body.contains('|'), "{mode} {path}");
            }
        }
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_interfere() {
        let app = app();
        let mut handles = Vec::new();
        for i in 0..16 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                let user = format!("user{i}");
                let role = if i % 2 == 0 { "ARTIST" } else { "CUSTOMER" };
                let bearer = format!("Bearer {}", test_support::token(&user, role));
                let (status, body) =
                    send(app, "/api/products", &[("authorization", bearer.as_str())]).await;
                (status, body, format!("{user}|{role}"))
            }));
        }

        for handle in handles {
            let (status, body, expected) = handle.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, expected);
        }
    }
}
