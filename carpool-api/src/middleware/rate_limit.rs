use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::state::AppState;

const WINDOW_SECONDS: i64 = 60;

/// Per-IP fixed window backed by Redis. Fails open when Redis is unreachable.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into());
    let key = format!("ratelimit:{}", ip);

    match redis
        .check_rate_limit(&key, redis.requests_per_minute(), WINDOW_SECONDS)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, letting request through");
            next.run(req).await
        }
    }
}
