//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Login and registration share one per-client token bucket, sized from
//! [`RateLimitConfig`].

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;

/// Client address from reverse proxy headers.
///
/// Checked in order: `CF-Connecting-IP`, the first hop of `X-Forwarded-For`,
/// `X-Real-IP`, `Fly-Client-IP`. Unparseable values are skipped.
#[must_use]
pub fn forwarded_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    [
        header("cf-connecting-ip"),
        header("x-forwarded-for").and_then(|s| s.split(',').next()),
        header("x-real-ip"),
        header("fly-client-ip"),
    ]
    .into_iter()
    .flatten()
    .find_map(|value| value.trim().parse::<IpAddr>().ok())
}

/// Keys requests by client IP: proxy headers first, then the peer address.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_client_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the rate limiter for the auth endpoints.
///
/// One request is replenished every `period_secs`, up to `burst` at once.
///
/// # Panics
///
/// Panics if `period_secs` or `burst` is zero. Configuration loading rejects
/// both.
#[must_use]
pub fn auth_rate_limiter(limits: RateLimitConfig) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(limits.period_secs)
        .burst_size(limits.burst)
        .finish()
        .expect("rate limiter period and burst are validated as positive");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.9"),
        ]);
        assert_eq!(
            forwarded_client_ip(&map),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let map = headers(&[("x-forwarded-for", " 198.51.100.4 , 10.0.0.2")]);
        assert_eq!(
            forwarded_client_ip(&map),
            Some("198.51.100.4".parse().unwrap())
        );
    }

    #[test]
    fn test_garbage_headers_are_skipped() {
        let map = headers(&[("x-forwarded-for", "unknown"), ("x-real-ip", "::1")]);
        assert_eq!(forwarded_client_ip(&map), Some("::1".parse().unwrap()));
        assert_eq!(forwarded_client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = Request::new(());
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4000))));
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            "192.0.2.7".parse::<IpAddr>().unwrap()
        );

        let bare = Request::new(());
        assert!(ClientIpKeyExtractor.extract(&bare).is_err());
    }
}
