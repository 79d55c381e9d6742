//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared subsystems (router, limiter, validator, forwarder)
//! - Create the Axum Router: `/health` plus a catch-all dispatcher
//! - Wire up middleware (request ID, tracing, access log, panics, CORS)
//! - Serve on a listener until the shutdown signal fires

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any as AnyValue, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{CorsConfig, GatewayConfig};
use crate::config::validation::parse_hmac_algorithm;
use crate::error::detail_response;
use crate::http::dispatcher::dispatch_handler;
use crate::http::health::{health_handler, health_method_not_allowed};
use crate::http::middleware::access_log;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::proxy::Forwarder;
use crate::routing::ServiceRouter;
use crate::security::rate_limit::StorageError;
use crate::security::{RateLimiter, TokenValidator};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ServiceRouter>,
    pub limiter: Arc<RateLimiter>,
    pub validator: Arc<TokenValidator>,
    pub forwarder: Arc<Forwarder>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("rate limiter: {0}")]
    RateLimit(#[from] StorageError),
    #[error("unsupported JWT algorithm: {0}")]
    Algorithm(String),
    #[error("invalid CORS origin: {0}")]
    CorsOrigin(String),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Build every subsystem from an already validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let algorithm = parse_hmac_algorithm(&config.auth.algorithm)
            .ok_or_else(|| StartupError::Algorithm(config.auth.algorithm.clone()))?;

        let service_router = ServiceRouter::from_config(
            &config.routes,
            config.listener.mount_path.as_deref(),
        );
        tracing::info!(services = service_router.len(), "Routing table loaded");

        let state = AppState {
            router: Arc::new(service_router),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)?),
            validator: Arc::new(TokenValidator::new(
                &config.auth.secret,
                algorithm,
                config.auth.leeway_secs,
            )),
            forwarder: Arc::new(Forwarder::new(&config.timeouts, &config.retries)),
        };

        let cors = cors_layer(&config.cors)?;
        let router = Self::build_router(state.clone(), cors);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers wrap outside-in in reverse order of `.layer` calls, so the
    /// request ID is assigned before anything logs.
    fn build_router(state: AppState, cors: CorsLayer) -> Router {
        Router::new()
            .route("/health", get(health_handler).fallback(health_method_not_allowed))
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(cors)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(access_log))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. In-flight requests are allowed to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let limiter = self.state.limiter.clone();
        let sweeper_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            limiter.run_sweeper(sweeper_shutdown).await;
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, StartupError> {
    if config.allowed_origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(AnyValue)
            .allow_headers(AnyValue));
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|_| StartupError::CorsOrigin(o.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    // Credentials forbid wildcards, so methods and headers echo the preflight.
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %message, "Request handler panicked");
    detail_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
