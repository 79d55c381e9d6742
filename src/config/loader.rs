//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{GatewayConfig, LogFormat, RateLimitStrategy};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value '{value}' for {var}")]
    Env { var: String, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Name of the environment variable carrying a service's base URL.
/// `users` becomes `USERS_SERVICE_URL`, `social-graph` becomes `SOCIAL_GRAPH_SERVICE_URL`.
pub fn service_url_var(service: &str) -> String {
    let name: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_SERVICE_URL", name)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEWAY_MOUNT_PATH") {
        config.listener.mount_path = if v.is_empty() { None } else { Some(v) };
    }

    for route in &mut config.routes {
        if let Some(v) = lookup(&service_url_var(&route.name)) {
            route.base_url = v;
        }
    }

    if let Some(v) = lookup("JWT_SECRET") {
        config.auth.secret = v;
    }
    if let Some(v) = lookup("JWT_ALGORITHM") {
        config.auth.algorithm = v;
    }

    if let Some(v) = lookup("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse_var("RATE_LIMIT_ENABLED", &v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_STRATEGY") {
        config.rate_limit.strategy = RateLimitStrategy::from_str(&v).map_err(|_| ConfigError::Env {
            var: "RATE_LIMIT_STRATEGY".into(),
            value: v.clone(),
        })?;
    }
    if let Some(v) = lookup("RATE_LIMIT_CAPACITY") {
        config.rate_limit.capacity = parse_var("RATE_LIMIT_CAPACITY", &v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_INTERVAL_SECS") {
        config.rate_limit.interval_secs = parse_var("RATE_LIMIT_INTERVAL_SECS", &v)?;
    }
    if let Some(v) = lookup("REDIS_URL") {
        config.rate_limit.redis_url = v;
    }

    if let Some(v) = lookup("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(v) = lookup("UPSTREAM_CONNECT_TIMEOUT_MS") {
        config.timeouts.connect_ms = parse_var("UPSTREAM_CONNECT_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = lookup("UPSTREAM_REQUEST_TIMEOUT_SECS") {
        config.timeouts.request_secs = parse_var("UPSTREAM_REQUEST_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = lookup("LOG_FORMAT") {
        config.observability.log_format = match v.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT".into(),
                    value: v,
                })
            }
        };
    }

    Ok(())
}

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn service_url_var_names() {
        assert_eq!(service_url_var("users"), "USERS_SERVICE_URL");
        assert_eq!(service_url_var("social-graph"), "SOCIAL_GRAPH_SERVICE_URL");
    }

    #[test]
    fn env_overrides_apply() {
        let vars = env(&[
            ("USERS_SERVICE_URL", "http://localhost:9001"),
            ("JWT_SECRET", "s3cret"),
            ("RATE_LIMIT_CAPACITY", "5"),
            ("RATE_LIMIT_STRATEGY", "fixed_window"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test"),
            ("GATEWAY_MOUNT_PATH", "/api/v1"),
        ]);
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        let users = config.routes.iter().find(|r| r.name == "users").unwrap();
        assert_eq!(users.base_url, "http://localhost:9001");
        assert_eq!(config.auth.secret, "s3cret");
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.strategy, RateLimitStrategy::FixedWindow);
        assert_eq!(config.cors.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.listener.mount_path.as_deref(), Some("/api/v1"));
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let vars = env(&[("RATE_LIMIT_CAPACITY", "lots")]);
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "RATE_LIMIT_CAPACITY"));
    }

    #[test]
    fn parses_toml_routes() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8000"

            [[routes]]
            name = "events"
            base_url = "http://events:8001"
            public_methods = ["GET"]

            [rate_limit]
            capacity = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].public_methods, vec!["GET"]);
        assert!(config.routes[0].public_paths.is_empty());
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.interval_secs, 60);
        assert!(validate_config(&config).is_ok());
    }
}
