//! Client address resolution.
//!
//! # Responsibilities
//! - Derive the ClientIdentity used for whitelisting and rate limiting
//! - Believe `X-Forwarded-For` only when the peer is a trusted proxy
//!
//! # Design Decisions
//! - Walk the forwarded chain right-to-left and stop at the first
//!   address that is not a trusted proxy
//! - IPv4-mapped IPv6 addresses are folded to IPv4 so whitelist entries match

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

use crate::config::ClientIpConfig;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The resolved source address of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientIdentity(IpAddr);

impl ClientIdentity {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip.to_canonical())
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolves [`ClientIdentity`] from the peer address and headers.
#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    trusted_proxies: Vec<IpAddr>,
}

impl ClientIpResolver {
    pub fn new(trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trusted_proxies: trusted_proxies.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    /// Build from configuration. Unparseable entries are skipped; validation
    /// reports them before the server starts.
    pub fn from_config(config: &ClientIpConfig) -> Self {
        Self::new(
            config
                .trusted_proxies
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
        )
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }

    pub fn resolve(&self, peer: SocketAddr, headers: &HeaderMap) -> ClientIdentity {
        let peer_ip = peer.ip().to_canonical();
        if !self.is_trusted(&peer_ip) {
            return ClientIdentity(peer_ip);
        }

        let mut resolved = peer_ip;
        let hops = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .collect::<Vec<_>>();

        for hop in hops.into_iter().rev() {
            let Ok(ip) = hop.parse::<IpAddr>() else {
                // A garbage hop ends the trusted chain.
                break;
            };
            let ip = ip.to_canonical();
            resolved = ip;
            if !self.is_trusted(&ip) {
                break;
            }
        }

        ClientIdentity(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(xff: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(X_FORWARDED_FOR, HeaderValue::from_str(xff).unwrap());
        h
    }

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 40000)
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let resolver = ClientIpResolver::default();
        let id = resolver.resolve(peer("203.0.113.9"), &headers("1.2.3.4"));
        assert_eq!(id.to_string(), "203.0.113.9");
    }

    #[test]
    fn test_trusted_chain_is_walked_right_to_left() {
        let resolver =
            ClientIpResolver::new(vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()]);
        let id = resolver.resolve(peer("10.0.0.1"), &headers("9.9.9.9, 1.2.3.4, 10.0.0.2"));
        assert_eq!(id.to_string(), "1.2.3.4");
    }

    #[test]
    fn test_trusted_peer_without_header_is_client() {
        let resolver = ClientIpResolver::new(vec!["10.0.0.1".parse().unwrap()]);
        let id = resolver.resolve(peer("10.0.0.1"), &HeaderMap::new());
        assert_eq!(id.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_garbage_hop_stops_walk() {
        let resolver = ClientIpResolver::new(vec!["10.0.0.1".parse().unwrap()]);
        let id = resolver.resolve(peer("10.0.0.1"), &headers("1.2.3.4, unknown"));
        assert_eq!(id.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_ipv4_mapped_addresses_are_folded() {
        let resolver = ClientIpResolver::default();
        let id = resolver.resolve(peer("::ffff:127.0.0.1"), &HeaderMap::new());
        assert_eq!(id.to_string(), "127.0.0.1");
    }
}
