use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

/// Rate limiter keyed by IP address
pub type IpRateLimiter = Arc<RateLimiter<SocketAddr, DashMapStateStore<SocketAddr>, DefaultClock>>;

/// Create a keyed rate limiter (by IP) allowing `attempts` per `window_seconds`.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = attempts.max(1);
    let window_ms = window_seconds.max(1) * 1000;
    let period = Duration::from_millis((window_ms / attempts as u64).max(1));
    let burst = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Middleware state: the limiter plus where the client address comes from.
#[derive(Clone)]
pub struct IpRateLimit {
    limiter: IpRateLimiter,
    trust_forwarded_for: bool,
}

impl IpRateLimit {
    /// With `trust_forwarded_for` unset the peer address is the only key, so
    /// a client cannot pick its own bucket through `X-Forwarded-For`.
    pub fn new(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_for,
        }
    }
}

fn forwarded_ip(request: &Request) -> Option<SocketAddr> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<std::net::IpAddr>().ok())
        .map(|ip| SocketAddr::new(ip, 0))
}

fn client_addr(request: &Request, trust_forwarded_for: bool) -> Option<SocketAddr> {
    if trust_forwarded_for && let Some(addr) = forwarded_ip(request) {
        return Some(addr);
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|axum::extract::ConnectInfo(addr)| SocketAddr::new(addr.ip(), 0))
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_addr(&request, limit.trust_forwarded_for) {
        Some(addr) => match limit.limiter.check_key(&addr) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(ip = %addr.ip(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs()),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
