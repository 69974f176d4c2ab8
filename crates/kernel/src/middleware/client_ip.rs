//! Client identification.
//!
//! The peer address is the client unless the peer is a configured proxy.
//! Only then are `X-Forwarded-For` and `X-Real-IP` read.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

/// Peers whose forwarding headers are believed.
#[derive(Debug, Clone)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl Default for TrustedProxies {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TrustedProxies {
    pub fn new(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(proxies.into_iter().collect())
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Client id for a request, using the peer address when the server exposes it.
    pub fn client_id<B>(&self, request: &Request<B>) -> String {
        let addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        get_client_id(addr, request.headers(), self)
    }
}

/// Get the client identifier (IP address) for rate limiting and logs.
pub fn get_client_id(addr: Option<SocketAddr>, headers: &HeaderMap, trusted: &TrustedProxies) -> String {
    let Some(peer) = addr.map(|a| a.ip()) else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer) {
        return peer.to_string();
    }

    // Nearest hop first; proxies in the chain are skipped, a client can only
    // prepend entries.
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
    {
        for hop in value.rsplit(',') {
            match hop.trim().parse::<IpAddr>() {
                Ok(ip) if trusted.contains(&ip) => continue,
                Ok(ip) => return ip.to_string(),
                Err(_) => break,
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && let Ok(ip) = value.trim().parse::<IpAddr>()
    {
        return ip.to_string();
    }

    peer.to_string()
}
