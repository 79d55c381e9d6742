//! Access logging.
//!
//! Every request is logged twice: on entry with method, path and client
//! address, and on completion with status and elapsed time. This wraps the
//! whole stack, so rejected, unroutable and health requests are logged too.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::dispatcher::RoutedService;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;

pub async fn access_log(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().to_string();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client = %peer,
        "Request received"
    );

    let response = next.run(request).await;

    let status = response.status();
    let service = response
        .extensions()
        .get::<RoutedService>()
        .map(|s| s.0.as_str())
        .unwrap_or("none");

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client = %peer,
        service,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status.as_u16(), service, start);

    response
}
