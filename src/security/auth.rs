//! Session token issuing and verification.
//!
//! # Responsibilities
//! - Check login credentials against a [`CredentialStore`]
//! - Mint HS256 session tokens with `iat`/`exp`
//! - Verify presented tokens, optionally prefixed with `Bearer `
//!
//! # Design Decisions
//! - The accepted algorithm is pinned to HS256; a token whose header names
//!   any other algorithm, `none` and unknown names included, is rejected as a
//!   bad signature before its signature is looked at
//! - Expiry is checked against the injected [`Clock`], not the library's
//!   own time source, with zero leeway
//! - Stateless: no server-side revocation

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::security::clock::{Clock, SystemClock};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the username).
    pub sub: String,
    /// Issued at, unix seconds.
    pub iat: u64,
    /// Expires at, unix seconds.
    pub exp: u64,
}

/// A signed session token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no token provided in Authorization header")]
    MissingToken,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Looks up whether a username/password pair is valid.
pub trait CredentialStore: Send + Sync {
    fn check(&self, username: &str, password: &str) -> bool;
}

/// A single fixed credential pair.
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialStore for StaticCredentials {
    fn check(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// Issues and verifies session tokens.
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(
        secret: &[u8],
        token_ttl: Duration,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // exp is checked against our own clock in `verify`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            credentials,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl,
            clock,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            Duration::from_secs(config.token_ttl_secs),
            Arc::new(StaticCredentials::new(&config.username, &config.password)),
            Arc::new(SystemClock),
        )
    }

    /// Check credentials and mint a token valid for the configured TTL.
    pub fn issue_token(&self, username: &str, password: &str) -> Result<SessionToken, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        if !self.credentials.check(username, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now_unix();
        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.token_ttl.as_secs(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<SessionToken, AuthError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map(SessionToken)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify a raw `Authorization` value (`<token>` or `Bearer <token>`).
    pub fn verify(&self, raw: Option<&str>) -> Result<Claims, AuthError> {
        let token = strip_scheme(raw.unwrap_or_default())?;

        let header = decode_header(token).map_err(|e| {
            if names_foreign_algorithm(token) {
                AuthError::InvalidSignature
            } else {
                AuthError::MalformedToken(e.to_string())
            }
        })?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidSignature);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidKeyFormat => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::MalformedToken(e.to_string()),
            }
        })?;

        if self.clock.now_unix() >= data.claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(data.claims)
    }
}

/// Whether the token header is readable JSON naming an algorithm the
/// library does not know, such as `none`.
fn names_foreign_algorithm(token: &str) -> bool {
    let segment = token.split('.').next().unwrap_or_default();
    let Ok(raw) = URL_SAFE_NO_PAD.decode(segment) else {
        return false;
    };
    let Ok(header) = serde_json::from_slice::<serde_json::Value>(&raw) else {
        return false;
    };
    matches!(header.get("alg").and_then(|alg| alg.as_str()), Some(alg) if alg != "HS256")
}

fn strip_scheme(raw: &str) -> Result<&str, AuthError> {
    let raw = raw.trim();
    let token = match raw.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return Err(AuthError::MalformedToken("unsupported scheme".to_string())),
        None => raw,
    };
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
