//! Admission middleware: one controller check per request, before any handler runs.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error, warn};

use super::AppState;
use crate::admission::{AdmissionBackend, Decision, RateKey};
use crate::error::{GatekeeperError, Result};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const RATELIMIT_LIMIT: &str = "ratelimit-limit";
const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
const RATELIMIT_RESET: &str = "ratelimit-reset";

const REJECT_MESSAGE: &str = "Too many requests, please try again later.";

/// Run the admission check and either forward the request or answer 429.
pub async fn admission_middleware<B: AdmissionBackend + 'static>(
    State(state): State<AppState<B>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let key = match client_key(request.headers(), peer, state.trust_forwarded_for) {
        Ok(key) => key,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Could not derive rate key");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let limit = state.backend.policy().max_requests();

    match state.backend.admit(&key).await {
        Ok(Decision::Admit {
            remaining,
            reset_after,
        }) => {
            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        Ok(Decision::Reject { retry_after }) => {
            debug!(
                key = %key,
                path = %request.uri().path(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Request rejected by admission control"
            );
            too_many_requests(limit, retry_after)
        }
        Err(e) => {
            error!(key = %key, error = %e, "Admission check failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "admission check unavailable")
        }
    }
}

/// The peer address, or the first `X-Forwarded-For` hop when trusted.
fn client_key(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> Result<RateKey> {
    if trust_forwarded_for {
        if let Some(value) = headers.get(X_FORWARDED_FOR) {
            let raw = value.to_str().map_err(|_| {
                GatekeeperError::InvalidArgument("X-Forwarded-For is not valid text".into())
            })?;
            let first_hop = raw.split(',').next().unwrap_or_default().trim();
            return RateKey::new(first_hop);
        }
    }
    Ok(RateKey::from(peer.ip()))
}

fn too_many_requests(limit: u64, retry_after: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": REJECT_MESSAGE,
            "retry_after_ms": retry_after.as_millis() as u64,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(retry_after)));
    set_rate_limit_headers(headers, limit, 0, retry_after);
    response
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64, reset_after: Duration) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_after)));
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Whole seconds, rounded up so clients never retry early.
fn ceil_secs(duration: Duration) -> u64 {
    (duration.as_millis() as u64).div_ceil(1000)
}
