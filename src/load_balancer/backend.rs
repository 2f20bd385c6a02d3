//! Upstream target abstraction.
//!
//! # Responsibilities
//! - Represent one configured upstream base URL
//! - Rewrite an inbound path and query onto that base

use std::fmt;

use axum::http::Uri;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cannot build upstream URI: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),
}

/// A single upstream target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Base URL as configured, used for the diagnostic header.
    label: String,
    /// Parsed base URL.
    base_url: Url,
}

impl UpstreamTarget {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let base_url = Url::parse(raw).map_err(|e| TargetError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        // Upstream connections are plain TCP; TLS ends before the edge.
        if base_url.scheme() != "http" || !base_url.has_host() {
            return Err(TargetError::InvalidUrl {
                url: raw.to_string(),
                reason: "expected an http URL with a host".to_string(),
            });
        }
        Ok(Self {
            label: raw.trim_end_matches('/').to_string(),
            base_url,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Join the target's base path with an inbound path and raw query.
    pub fn uri_for(&self, path: &str, query: Option<&str>) -> Result<Uri, TargetError> {
        let mut joined = String::with_capacity(self.label.len() + path.len() + 1);
        joined.push_str(self.base_url.scheme());
        joined.push_str("://");
        joined.push_str(self.base_url.host_str().unwrap_or_default());
        if let Some(port) = self.base_url.port() {
            joined.push(':');
            joined.push_str(&port.to_string());
        }
        joined.push_str(self.base_url.path().trim_end_matches('/'));
        if !path.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            joined.push('?');
            joined.push_str(query);
        }
        Ok(joined.parse::<Uri>()?)
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
