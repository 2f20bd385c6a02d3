//! Error types shared across the edge.
//!
//! Every stage failure is an [`EdgeError`]; `http::response` maps each
//! variant to a status code and JSON body.

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::proxy::ForwardError;
use crate::load_balancer::TargetError;
use crate::pipeline::Stage;
use crate::security::{AuthError, ClientIdentity, WhitelistError};

/// A request-level failure.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("{client} is not in whitelist")]
    NotWhitelisted { client: ClientIdentity },

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error("too many requests")]
    RateLimited,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("error calling data service: {0}")]
    DataService(String),

    #[error("{0}")]
    BadRequest(String),
}

impl EdgeError {
    /// The pipeline stage that produced this error, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EdgeError::NotWhitelisted { .. } | EdgeError::Whitelist(_) => Some(Stage::Whitelist),
            EdgeError::RateLimited => Some(Stage::RateLimit),
            EdgeError::Auth(
                AuthError::MissingToken
                | AuthError::MalformedToken(_)
                | AuthError::InvalidSignature
                | AuthError::Expired,
            ) => Some(Stage::Auth),
            EdgeError::Forward(_) => Some(Stage::Forward),
            _ => None,
        }
    }
}

/// Failure while wiring the services at startup.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<WhitelistError> for BuildError {
    fn from(e: WhitelistError) -> Self {
        BuildError::Client(e.to_string())
    }
}
