/// Factory: build the `Gatekeeper` (and its verifier) from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::exemption::{ExemptionSet, MatchMode};
use crate::services::auth::{Gatekeeper, JwtVerifier};

pub fn build_gatekeeper(config: &Config) -> Result<Arc<Gatekeeper>, AppError> {
    let verifier = JwtVerifier::new(
        &config.verification_key,
        config.auth_issuer.as_deref(),
        config.auth_audience.as_deref(),
        config.access_token_leeway_seconds,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to build credential verifier");
        AppError::Internal
    })?;

    let exemptions = ExemptionSet::new(config.exempt_paths.iter().cloned(), config.exempt_match_mode);

    if exemptions.mode() == MatchMode::Contains {
        tracing::warn!(
            patterns = ?exemptions.patterns().collect::<Vec<_>>(),
            "exemptions use substring matching; any path containing a pattern skips authentication \
             (set EXEMPT_MATCH_MODE=segment to anchor on path segments)"
        );
    }

    Ok(Arc::new(Gatekeeper::new(
        exemptions,
        Arc::new(verifier),
        config.verify_timeout,
    )))
}
