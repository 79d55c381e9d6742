//! Upstream request forwarding.
//!
//! # Responsibilities
//! - Own the shared, pooled upstream client
//! - Send one outbound request per attempt with filtered headers
//! - Stream request and response bodies without buffering them
//! - Retry transient failures of replayable idempotent requests
//!
//! # Design Decisions
//! - Bodies are pulled chunk by chunk by hyper, so a slow reader on either
//!   side slows the other side down instead of filling memory
//! - Only small, length-delimited bodies are buffered, and only when a
//!   retry could need them again
//! - Dropping the returned response (client went away) drops the upstream
//!   connection with it

use std::mem;
use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Request, Response, Uri, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{RetryConfig, TimeoutConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::{is_idempotent, RetryPolicy, UpstreamFailure, UpstreamTimeouts};
use crate::security::headers::strip_hop_by_hop;

pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build the pooled keep-alive client shared by all requests.
pub fn build_client(timeouts: &UpstreamTimeouts) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(timeouts.connect));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(connector)
}

/// Request body as it will be sent upstream.
#[derive(Debug)]
pub enum OutboundBody {
    Empty,
    /// Fully read once so it can be replayed on retry.
    Buffered(Bytes),
    /// Passed through as-is; usable for a single attempt.
    Streaming(Body),
    /// A streaming body already handed to an attempt.
    Consumed,
}

impl OutboundBody {
    /// Decide how to carry `body` upstream.
    ///
    /// `replay_limit` is `None` when the request will not be retried; the
    /// body is then streamed unless it is known to be empty.
    pub async fn prepare(body: Body, replay_limit: Option<usize>) -> GatewayResult<Self> {
        let exact = HttpBody::size_hint(&body).exact();
        if exact == Some(0) {
            return Ok(OutboundBody::Empty);
        }

        match (replay_limit, exact) {
            (Some(limit), Some(len)) if len <= limit as u64 => {
                let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
                    tracing::debug!(error = %e, "Failed to read request body");
                    GatewayError::BadRequest
                })?;
                Ok(OutboundBody::Buffered(bytes))
            }
            _ => Ok(OutboundBody::Streaming(body)),
        }
    }

    pub fn is_replayable(&self) -> bool {
        matches!(self, OutboundBody::Empty | OutboundBody::Buffered(_))
    }

    /// Body for the next attempt; `None` once a streaming body was used.
    fn for_attempt(&mut self) -> Option<Body> {
        match self {
            OutboundBody::Empty => Some(Body::empty()),
            OutboundBody::Buffered(bytes) => Some(Body::from(bytes.clone())),
            OutboundBody::Streaming(_) => match mem::replace(self, OutboundBody::Consumed) {
                OutboundBody::Streaming(body) => Some(body),
                _ => None,
            },
            OutboundBody::Consumed => None,
        }
    }
}

/// Everything needed to send one proxied request. Owned by a single
/// request and dropped when its response finishes.
#[derive(Debug)]
pub struct ForwardContext {
    /// Service key, for logs and metrics.
    pub service: String,
    pub method: Method,
    pub target: Uri,
    /// Outbound headers, already filtered.
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

pub struct Forwarder {
    client: UpstreamClient,
    timeouts: UpstreamTimeouts,
    retry: RetryPolicy,
    replay_buffer_bytes: usize,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, retries: &RetryConfig) -> Self {
        let timeouts = UpstreamTimeouts::from_config(timeouts);
        Self {
            client: build_client(&timeouts),
            timeouts,
            retry: RetryPolicy::from_config(retries),
            replay_buffer_bytes: retries.replay_buffer_bytes,
        }
    }

    /// Largest body worth buffering for `method`, or `None` if it will never be retried.
    pub fn replay_limit(&self, method: &Method) -> Option<usize> {
        (is_idempotent(method) && self.retry.attempts_for(method, true) > 1)
            .then_some(self.replay_buffer_bytes)
    }

    pub async fn forward(&self, mut ctx: ForwardContext) -> GatewayResult<Response<Body>> {
        let replayable = ctx.body.is_replayable();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let body = ctx
                .body
                .for_attempt()
                .ok_or_else(|| GatewayError::Internal("request body already consumed".into()))?;
            let request = build_request(&ctx, body)?;

            let failure = match self
                .timeouts
                .within_request_deadline(self.client.request(request))
                .await
            {
                Some(Ok(response)) => {
                    tracing::debug!(
                        service = %ctx.service,
                        attempt,
                        status = %response.status(),
                        "Upstream responded"
                    );
                    return Ok(client_response(response));
                }
                Some(Err(e)) => {
                    let failure = if e.is_connect() {
                        UpstreamFailure::Connect
                    } else {
                        UpstreamFailure::Other
                    };
                    tracing::warn!(service = %ctx.service, attempt, error = %e, ?failure, "Upstream error");
                    failure
                }
                None => {
                    tracing::warn!(
                        service = %ctx.service,
                        attempt,
                        timeout = ?self.timeouts.request,
                        "Upstream timed out"
                    );
                    UpstreamFailure::Timeout
                }
            };

            if self.retry.should_retry(&ctx.method, replayable, attempt, failure) {
                let delay = self.retry.backoff();
                tracing::info!(service = %ctx.service, attempt, delay = ?delay, "Retrying request");
                metrics::record_upstream_retry(&ctx.service);
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(GatewayError::BadGateway(format!(
                "{} {} failed after {} attempt(s): {:?}",
                ctx.method, ctx.target, attempt, failure
            )));
        }
    }
}

fn build_request(ctx: &ForwardContext, body: Body) -> GatewayResult<Request<Body>> {
    let mut request = Request::builder()
        .method(ctx.method.clone())
        .uri(ctx.target.clone())
        .version(Version::HTTP_11)
        .body(body)
        .map_err(|e| GatewayError::Internal(format!("failed to build upstream request: {e}")))?;
    *request.headers_mut() = ctx.headers.clone();
    Ok(request)
}

/// Hand the backend response to the client: same status and headers minus
/// hop-by-hop ones, body streamed.
fn client_response<B>(response: Response<B>) -> Response<Body>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn empty_body_is_replayable() {
        let body = OutboundBody::prepare(Body::empty(), None).await.unwrap();
        assert!(matches!(body, OutboundBody::Empty));
        assert!(body.is_replayable());
    }

    #[tokio::test]
    async fn small_known_body_is_buffered_when_retries_possible() {
        let body = OutboundBody::prepare(Body::from("hello"), Some(1024)).await.unwrap();
        match body {
            OutboundBody::Buffered(bytes) => assert_eq!(&bytes[..], b"hello"),
            other => panic!("expected buffered body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn large_or_unretried_body_streams() {
        let body = OutboundBody::prepare(Body::from("hello"), Some(2)).await.unwrap();
        assert!(matches!(body, OutboundBody::Streaming(_)));

        let body = OutboundBody::prepare(Body::from("hello"), None).await.unwrap();
        assert!(!body.is_replayable());
    }

    #[test]
    fn streaming_body_is_used_once() {
        let mut body = OutboundBody::Streaming(Body::from("x"));
        assert!(body.for_attempt().is_some());
        assert!(body.for_attempt().is_none());

        let mut body = OutboundBody::Buffered(Bytes::from_static(b"x"));
        assert!(body.for_attempt().is_some());
        assert!(body.for_attempt().is_some());
    }

    #[test]
    fn client_response_strips_hop_by_hop() {
        let upstream = Response::builder()
            .status(StatusCode::CREATED)
            .header(header::CONNECTION, "keep-alive")
            .header("keep-alive", "timeout=5")
            .header("x-backend", "posts")
            .body(Body::from("ok"))
            .unwrap();
        let response = client_response(upstream);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert!(response.headers().get("keep-alive").is_none());
        assert_eq!(response.headers()["x-backend"], "posts");
    }

    #[tokio::test]
    async fn replay_limit_only_for_retryable_methods() {
        let forwarder = Forwarder::new(&TimeoutConfig::default(), &RetryConfig::default());
        assert_eq!(forwarder.replay_limit(&Method::PUT), Some(1024 * 1024));
        assert_eq!(forwarder.replay_limit(&Method::POST), None);
    }
}
