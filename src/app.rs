/*
 * Responsibility
 * - Load Config → build services → assemble the Router
 * - Layer order (outermost first): request-id / trace / limits → gatekeeper → routes
 * - Serve with axum::serve()
 */
use std::{panic, process};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::auth::build_gatekeeper;
use crate::services::proxy::{RouteTable, Upstream};
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,edge_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics through tracing; stderr may not be collected.
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let gatekeeper = build_gatekeeper(config).context("building gatekeeper")?;

    for (prefix, upstream) in &config.routes {
        tracing::info!(%prefix, %upstream, "route");
    }
    let upstream = Upstream::new(
        RouteTable::new(config.routes.iter().cloned()),
        config.upstream_timeout,
    );

    Ok(AppState::new(gatekeeper, upstream))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let routes = Router::new()
        .route("/actuator/health", get(api::health::health))
        .fallback(api::proxy::forward);

    // Gatekeeper wraps every route, the proxy fallback included.
    let routes = middleware::auth::gatekeeper::apply(routes, state.clone()).with_state(state);

    middleware::http::apply(routes, config.body_limit_bytes, config.request_timeout)
}
