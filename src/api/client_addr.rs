//! Source address used as the login throttling key.
//!
//! Forwarding headers are only honoured when the TCP peer is a configured
//! trusted proxy. A direct client can put anything in `X-Forwarded-For`, so
//! for everyone else the socket address is the only thing that counts.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::AppState;
use crate::constants::{LOOPBACK_PLACEHOLDER, headers};

/// Client address resolved for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

impl ClientAddress {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For is a list; the left-most entry is the original client.
    value.split(',').next()?.trim().parse().ok()
}

/// Pick the address to throttle on.
///
/// Header precedence behind a trusted proxy: forwarded-for, real-ip, CDN
/// client header. Falls back to the peer, then to the loopback placeholder
/// when no peer is known (in-process requests).
#[must_use]
pub fn resolve_client_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> String {
    let peer_is_trusted = peer.is_some_and(|ip| trusted_proxies.contains(&ip));

    if peer_is_trusted {
        let forwarded = [headers::FORWARDED_FOR, headers::REAL_IP, headers::CDN_CLIENT_IP]
            .into_iter()
            .find_map(|name| header_ip(headers, name));

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map_or_else(|| LOOPBACK_PLACEHOLDER.to_string(), |ip| ip.to_string())
}

impl FromRequestParts<Arc<AppState>> for ClientAddress {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(resolve_client_address(
            &parts.headers,
            peer,
            &state.trusted_proxies,
        )))
    }
}
