/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - gatekeeper: exemption set + credential verifier, read-only after startup
 *   - upstream: route table + pooled client
 * - Clone is cheap (Arc / pooled handles inside)
 */
use std::sync::Arc;

use crate::services::{auth::Gatekeeper, proxy::Upstream};

#[derive(Clone, Debug)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub upstream: Upstream,
}

impl AppState {
    pub fn new(gatekeeper: Arc<Gatekeeper>, upstream: Upstream) -> Self {
        Self {
            gatekeeper,
            upstream,
        }
    }
}
