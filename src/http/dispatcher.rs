//! Per-request orchestration.
//!
//! # State Machine
//! ```text
//! Received → RateChecked → Routed → AuthChecked → Forwarded → Completed
//!     any step may end the request with a typed GatewayError
//! ```
//!
//! Rate limiting runs before routing, so unknown services still spend the
//! client's budget. Errors from each step are mapped 1:1 to HTTP statuses by
//! `GatewayError`; nothing here builds an error body by hand.

use std::fmt;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::{GatewayError, GatewayResult};
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::proxy::{ForwardContext, OutboundBody};
use crate::security::headers::outbound_headers;
use crate::security::Decision;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    RateChecked,
    Routed,
    AuthChecked,
    Forwarded,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::RateChecked => "rate_checked",
            Stage::Routed => "routed",
            Stage::AuthChecked => "auth_checked",
            Stage::Forwarded => "forwarded",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Service that handled a request, attached to the response for the access log.
#[derive(Debug, Clone)]
pub struct RoutedService(pub String);

#[derive(Debug)]
struct Progress {
    stage: Stage,
    service: Option<String>,
}

/// Fallback handler: every request that is not `/health`.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request.request_id().to_string();
    let mut progress = Progress {
        stage: Stage::Received,
        service: None,
    };

    let mut response = match dispatch(&state, peer, request, &mut progress).await {
        Ok(response) => {
            progress.stage = Stage::Completed;
            response
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::error!(request_id = %request_id, stage = %progress.stage, error = %err, "Request failed");
            } else {
                tracing::info!(request_id = %request_id, stage = %progress.stage, error = %err, "Request rejected");
            }
            err.into_response()
        }
    };

    if let Some(service) = progress.service {
        response.extensions_mut().insert(RoutedService(service));
    }
    response
}

async fn dispatch(
    state: &AppState,
    peer: SocketAddr,
    request: Request<Body>,
    progress: &mut Progress,
) -> GatewayResult<Response> {
    // 1. Rate limit
    let client_key = state.limiter.client_key(&peer, request.headers());
    if state.limiter.check(&client_key).await == Decision::Reject {
        return Err(GatewayError::TooManyRequests {
            retry_after_secs: state.limiter.retry_after_secs(),
        });
    }
    progress.stage = Stage::RateChecked;

    // 2. Resolve service
    let (parts, body) = request.into_parts();
    let route = state.router.resolve(parts.uri.path(), &parts.method)?;
    progress.service = Some(route.entry.name.clone());
    progress.stage = Stage::Routed;

    // 3. Authenticate protected routes
    let claims = if route.public {
        None
    } else {
        Some(state.validator.authenticate(&parts.headers)?)
    };
    if let Some(claims) = &claims {
        tracing::debug!(service = %route.entry.name, subject = %claims.sub, "Authenticated");
    }
    progress.stage = Stage::AuthChecked;

    // 4. Forward
    let target: Uri = route
        .target(parts.uri.query())
        .parse()
        .map_err(|e| GatewayError::Internal(format!("invalid upstream URI: {e}")))?;
    let headers = outbound_headers(&parts.headers, peer.ip(), claims.as_ref().map(|c| c.sub.as_str()));
    let body = OutboundBody::prepare(body, state.forwarder.replay_limit(&parts.method)).await?;

    let ctx = ForwardContext {
        service: route.entry.name.clone(),
        method: parts.method,
        target,
        headers,
        body,
    };
    let response = state.forwarder.forward(ctx).await?;
    progress.stage = Stage::Forwarded;

    Ok(response.into_response())
}
