//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Validation is a pure
//! function that reports every problem it finds, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::Method;
use jsonwebtoken::Algorithm;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("mount path '{0}' must start with '/'")]
    MountPath(String),
    #[error("route name '{0}' must be non-empty and contain no '/'")]
    RouteName(String),
    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),
    #[error("route '{route}' has invalid base URL '{url}'")]
    BaseUrl { route: String, url: String },
    #[error("route '{route}' has invalid public method '{method}'")]
    PublicMethod { route: String, method: String },
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("unsupported signing algorithm '{0}' (expected HS256, HS384 or HS512)")]
    Algorithm(String),
    #[error("rate limit capacity must be greater than zero")]
    Capacity,
    #[error("rate limit interval must be greater than zero")]
    Interval,
    #[error("retry max_attempts must be at least 1")]
    MaxAttempts,
    #[error("{0} timeout must be greater than zero")]
    Timeout(&'static str),
}

/// Parse an HMAC algorithm identifier.
pub fn parse_hmac_algorithm(name: &str) -> Option<Algorithm> {
    match Algorithm::from_str(name.trim()) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Some(alg),
        _ => None,
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if let Some(mount) = &config.listener.mount_path {
        if !mount.starts_with('/') {
            errors.push(ValidationError::MountPath(mount.clone()));
        }
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if route.name.is_empty() || route.name.contains('/') {
            errors.push(ValidationError::RouteName(route.name.clone()));
        }
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        let url_ok = Url::parse(&route.base_url)
            .map(|u| u.scheme() == "http" && u.host_str().is_some())
            .unwrap_or(false);
        if !url_ok {
            errors.push(ValidationError::BaseUrl {
                route: route.name.clone(),
                url: route.base_url.clone(),
            });
        }
        for method in &route.public_methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::PublicMethod {
                    route: route.name.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    if config.auth.secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }
    if parse_hmac_algorithm(&config.auth.algorithm).is_none() {
        errors.push(ValidationError::Algorithm(config.auth.algorithm.clone()));
    }

    if config.rate_limit.capacity == 0 {
        errors.push(ValidationError::Capacity);
    }
    if config.rate_limit.interval_secs == 0 {
        errors.push(ValidationError::Interval);
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::MaxAttempts);
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::Timeout("connect"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Timeout("request"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
