//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Append the client address to X-Forwarded-For
//! - Strip hop-by-hop headers and Host before forwarding
//!
//! # Design Decisions
//! - Every other request header is cloned as-is
//! - An existing X-Forwarded-For chain is extended, never replaced

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::security::client_ip::{ClientIdentity, X_FORWARDED_FOR};

/// Connection-scoped headers that must not travel to the next hop.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Prepare inbound headers for the upstream request.
pub fn prepare_forward_headers(headers: &mut HeaderMap, client: &ClientIdentity) {
    // Headers named in `Connection` are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
    // The client sets Host from the target URI.
    headers.remove(header::HOST);

    append_forwarded_for(headers, client);
}

/// `X-Forwarded-For: <prior>, <client>` or `X-Forwarded-For: <client>`.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: &ClientIdentity) {
    let client = client.to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .collect();

    let value = if prior.is_empty() {
        client
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
