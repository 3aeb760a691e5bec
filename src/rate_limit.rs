/// Rate Limiting System
///
/// Buckets are keyed per caller: requests with a valid session token share
/// their account's bucket, everything else is keyed by peer IP. An invalid
/// bearer token does not move a caller into the authenticated quota.
use crate::{
    api::middleware::extract_bearer_token,
    config::RateLimitConfig,
    error::{PantryError, PantryResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

type KeyedLimiter = DefaultKeyedRateLimiter<String>;

/// Key used when the peer address is unavailable
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<KeyedLimiter>,
    unauthenticated: Arc<KeyedLimiter>,
}

fn non_zero(value: u32, fallback: NonZeroU32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(fallback)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(non_zero(config.authenticated_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size, NonZeroU32::MIN));

        // Anonymous callers get a fifth of the burst
        let unauth_quota = Quota::per_second(non_zero(config.unauthenticated_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size / 5, NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::keyed(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::keyed(unauth_quota)),
        }
    }

    fn check(&self, limiter: &KeyedLimiter, key: &str) -> PantryResult<()> {
        if !self.enabled {
            return Ok(());
        }

        limiter
            .check_key(&key.to_string())
            .map_err(|_| PantryError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            })
    }

    /// Check the bucket of an authenticated account
    pub fn check_authenticated(&self, account_id: &str) -> PantryResult<()> {
        self.check(&self.authenticated, account_id)
    }

    /// Check the bucket of an anonymous client
    pub fn check_unauthenticated(&self, client: &str) -> PantryResult<()> {
        self.check(&self.unauthenticated, client)
    }

    /// Drop keys whose buckets are full again
    pub fn retain_recent(&self) {
        self.authenticated.retain_recent();
        self.unauthenticated.retain_recent();
    }
}

/// Peer IP from the connection, when the server was started with connect info
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Response {
    let account_id = extract_bearer_token(request.headers())
        .and_then(|token| ctx.sessions.resolve(&token).ok());

    let result = match account_id {
        Some(account_id) => ctx.rate_limiter.check_authenticated(&account_id),
        None => ctx.rate_limiter.check_unauthenticated(&client_key(&request)),
    };

    match result {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), "Rate limit exceeded");
            e.into_response()
        }
    }
}
