//! Forwards admitted requests to the upstream service that owns the path.
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Request, Response, header},
};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::error::AppError;
use crate::services::proxy::routes::RouteTable;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route for path")]
    NoRoute,
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream timed out")]
    Timeout,
}

impl From<ProxyError> for AppError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::NoRoute => AppError::RouteNotFound,
            ProxyError::Upstream(_) => AppError::BadGateway,
            ProxyError::Timeout => AppError::GatewayTimeout,
            ProxyError::InvalidTarget(_) => AppError::Internal,
        }
    }
}

// Connection-scoped headers; never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Pooled HTTP/1 client plus the route table.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    routes: RouteTable,
    timeout: Duration,
}

impl Upstream {
    pub fn new(routes: RouteTable, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            routes,
            timeout,
        }
    }

    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let target = self.routes.target_uri(req.uri())?;
        let (mut parts, body) = req.into_parts();

        strip_hop_by_hop(&mut parts.headers);
        // the client derives Host from the target
        parts.headers.remove(header::HOST);
        parts.uri = target;

        let method = parts.method.clone();
        let uri = parts.uri.clone();

        let res = tokio::time::timeout(self.timeout, self.client.request(Request::from_parts(parts, body)))
            .await
            .map_err(|_| {
                tracing::warn!(%method, %uri, "upstream timed out");
                ProxyError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(%method, %uri, error = %e, "upstream request failed");
                ProxyError::Upstream(e.to_string())
            })?;

        let (mut parts, body) = res.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
