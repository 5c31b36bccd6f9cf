use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::AppState;

/// Address recorded against login attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl FromRequestParts<Arc<AppState>> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(resolve_client_ip(
            peer,
            &parts.headers,
            &state.config().security.auth_throttle.trusted_proxy_ips,
        )))
    }
}

/// The socket peer, unless the peer is a trusted proxy that supplied
/// `X-Forwarded-For`, in which case the first hop of that header.
#[must_use]
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    let peer_is_trusted = trusted_proxies
        .iter()
        .filter_map(|p| p.trim().parse::<IpAddr>().ok())
        .any(|p| p == peer);

    if peer_is_trusted
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|first| first.parse::<IpAddr>().ok())
    {
        return forwarded.to_string();
    }

    peer.to_string()
}
