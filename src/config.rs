/*
 * Responsibility
 * - Load settings from the environment (.env supported)
 * - Validate them up front (fail at startup, never per request)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::services::auth::exemption::MatchMode;

/// Paths that bypass authentication unless `EXEMPT_PATHS` says otherwise:
/// login/refresh, self-registration and operational health checks.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &["/auth/", "/users/register", "/actuator"];

/// Same endpoints as full prefixes, for anchored segment matching.
pub const DEFAULT_SEGMENT_EXEMPT_PATHS: &[&str] =
    &["/api/auth", "/api/users/register", "/actuator"];

pub fn default_exempt_paths(mode: MatchMode) -> &'static [&'static str] {
    match mode {
        MatchMode::Contains => DEFAULT_EXEMPT_PATHS,
        MatchMode::Segment => DEFAULT_SEGMENT_EXEMPT_PATHS,
    }
}

const DEFAULT_ROUTES: &str = "/api/auth=http://127.0.0.1:8081,\
/api/users=http://127.0.0.1:8081,\
/api/products=http://127.0.0.1:8082,\
/api/categories=http://127.0.0.1:8082,\
/api/orders=http://127.0.0.1:8083,\
/api/payments=http://127.0.0.1:8084";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Conflict(&'static str, &'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Conflict(a, b) => {
                write!(f, "conflicting configuration: set only one of {} and {}", a, b)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Key material used to check credential signatures.
#[derive(Clone, PartialEq, Eq)]
pub enum VerificationKey {
    /// HS256 shared secret.
    Secret(String),
    /// Ed25519 public key, PEM encoded.
    Ed25519PublicPem(String),
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            Self::Secret(_) => f.write_str("Secret(..)"),
            Self::Ed25519PublicPem(_) => f.write_str("Ed25519PublicPem(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub verification_key: VerificationKey,
    pub auth_issuer: Option<String>,
    pub auth_audience: Option<String>,
    pub access_token_leeway_seconds: u64,
    pub verify_timeout: Duration,

    pub exempt_paths: Vec<String>,
    pub exempt_match_mode: MatchMode,

    pub routes: Vec<(String, Url)>,
    pub upstream_timeout: Duration,

    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source. `from_env` feeds it the
    /// process environment; tests feed it a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or("GATEWAY_PORT", lookup("GATEWAY_PORT"), 8080)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("GATEWAY_PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        // The secret is used byte for byte; only an all-blank value counts as unset.
        let secret = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty());
        let public_pem = non_empty(lookup("ACCESS_JWT_PUBLIC_KEY_PEM")).map(|s| s.replace("\\n", "\n"));
        let verification_key = match (secret, public_pem) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "JWT_SECRET",
                    "ACCESS_JWT_PUBLIC_KEY_PEM",
                ));
            }
            (Some(secret), None) => VerificationKey::Secret(secret),
            (None, Some(pem)) => VerificationKey::Ed25519PublicPem(pem),
            (None, None) => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let auth_issuer = non_empty(lookup("AUTH_ISSUER"));
        let auth_audience = non_empty(lookup("AUTH_AUDIENCE"));

        let access_token_leeway_seconds = parse_or(
            "ACCESS_TOKEN_LEEWAY_SECONDS",
            lookup("ACCESS_TOKEN_LEEWAY_SECONDS"),
            0,
        )?;

        let verify_timeout = Duration::from_millis(parse_or(
            "VERIFY_TIMEOUT_MS",
            lookup("VERIFY_TIMEOUT_MS"),
            2000,
        )?);

        let exempt_match_mode = match lookup("EXEMPT_MATCH_MODE") {
            Some(raw) => raw
                .parse::<MatchMode>()
                .map_err(|_| ConfigError::Invalid("EXEMPT_MATCH_MODE"))?,
            None => MatchMode::Contains,
        };

        let exempt_paths = match lookup("EXEMPT_PATHS") {
            Some(raw) => split_list(&raw),
            None => default_exempt_paths(exempt_match_mode)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let routes = parse_routes(&lookup("ROUTES").unwrap_or_else(|| DEFAULT_ROUTES.to_string()))?;

        let upstream_timeout = Duration::from_millis(parse_or(
            "UPSTREAM_TIMEOUT_MS",
            lookup("UPSTREAM_TIMEOUT_MS"),
            10_000,
        )?);

        let request_timeout = Duration::from_secs(parse_or(
            "REQUEST_TIMEOUT_SECONDS",
            lookup("REQUEST_TIMEOUT_SECONDS"),
            30,
        )?);

        let body_limit_bytes = parse_or("BODY_LIMIT_BYTES", lookup("BODY_LIMIT_BYTES"), 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            verification_key,
            auth_issuer,
            auth_audience,
            access_token_leeway_seconds,
            verify_timeout,
            exempt_paths,
            exempt_match_mode,
            routes,
            upstream_timeout,
            request_timeout,
            body_limit_bytes,
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// Absent means default; present but unparsable is a startup error.
fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match non_empty(raw) {
        Some(s) => s.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_routes(raw: &str) -> Result<Vec<(String, Url)>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (prefix, upstream) = entry
                .split_once('=')
                .ok_or(ConfigError::Invalid("ROUTES"))?;
            let prefix = prefix.trim();
            if !prefix.starts_with('/') {
                return Err(ConfigError::Invalid("ROUTES"));
            }
            let upstream = Url::parse(upstream.trim()).map_err(|_| ConfigError::Invalid("ROUTES"))?;
            if !matches!(upstream.scheme(), "http") {
                return Err(ConfigError::Invalid("ROUTES"));
            }
            Ok((prefix.to_string(), upstream))
        })
        .collect()
}
