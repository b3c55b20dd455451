use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::config::VerificationKey;

/// Verified identity taken from a bearer credential.
///
/// Only a `CredentialVerifier` hands these out, and only after the signature and
/// expiry checks passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub principal: String,
    pub role: String,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Bad signature, expired, wrong issuer/audience, malformed encoding, missing claims.
    #[error("credential rejected: {0}")]
    Invalid(String),
    /// The verifier could not reach a decision (timeout, backend down).
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// Capability handed to the gatekeeper at construction.
///
/// Implementations must be free of shared mutable state; the gatekeeper calls
/// `verify` concurrently for unrelated requests.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError>;
}

/// Token payload as issued by the user service on login.
#[derive(Debug, Clone, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    role: Option<String>,
}

/// In-process JWT check: HS256 shared secret or EdDSA public key.
///
/// Key material is not printable via Debug.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtVerifier {
    pub fn new(
        key: &VerificationKey,
        issuer: Option<&str>,
        audience: Option<&str>,
        leeway_seconds: u64,
    ) -> Result<Self, String> {
        let (decoding_key, algorithm) = match key {
            VerificationKey::Secret(secret) => {
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            VerificationKey::Ed25519PublicPem(pem) => (
                DecodingKey::from_ed_pem(pem.as_bytes())
                    .map_err(|e| format!("invalid ed25519 public key pem: {}", e))?,
                Algorithm::EdDSA,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = leeway_seconds;

        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, VerifyError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let TokenClaims { sub, role } = data.claims;

        if sub.trim().is_empty() {
            return Err(VerifyError::Invalid("empty 'sub' claim".into()));
        }
        let role = role
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| VerifyError::Invalid("missing 'role' claim".into()))?;

        Ok(Claims {
            principal: sub,
            role,
        })
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        self.decode(token)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::{Value, json};

    pub const SECRET: &str = "test-signing-secret-with-enough-length";

    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    pub fn sign_with(secret: &str, claims: &Value) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    pub fn token(sub: &str, role: &str) -> String {
        sign_with(SECRET, &json!({ "sub": sub, "role": role, "exp": now() + 600 }))
    }
}
