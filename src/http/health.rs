//! Gateway health endpoint.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::error::detail_response;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub services: BTreeMap<String, String>,
}

/// `GET /health`. Not rate limited, not authenticated, never proxied.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let services = state
        .router
        .services()
        .map(|(name, url)| (name.to_string(), url.as_str().trim_end_matches('/').to_string()))
        .collect();

    Json(HealthReport {
        status: "ok",
        services,
    })
}

/// Any other method on `/health`, answered in the usual error shape.
pub async fn health_method_not_allowed() -> Response {
    detail_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
