//! Service lookup.
//!
//! # Responsibilities
//! - Store the compiled routing table
//! - Split an inbound path into service key and remainder
//! - Decide whether the request is exempt from authentication
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) service lookup via HashMap
//! - Explicit NotFound rather than silent default

use std::collections::HashMap;

use axum::http::Method;
use url::Url;

use crate::config::RouteConfig;
use crate::error::GatewayError;
use crate::routing::matcher::{remove_dot_segments, PathPattern};

/// A compiled backend service.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    pub base_url: Url,
    public_paths: Vec<PathPattern>,
    public_methods: Vec<Method>,
}

impl RouteEntry {
    /// Path check first, then the per-route method override.
    pub fn is_public(&self, rest: &str, method: &Method) -> bool {
        self.public_paths.iter().any(|p| p.matches(rest)) || self.public_methods.contains(method)
    }
}

/// Result of resolving an inbound request.
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    pub entry: &'a RouteEntry,
    /// Path below the service, always starting with `/`.
    pub rest: String,
    pub public: bool,
}

impl ResolvedRoute<'_> {
    /// Full upstream URL (path and query) for this request.
    pub fn target(&self, query: Option<&str>) -> String {
        let base = self.entry.base_url.as_str().trim_end_matches('/');
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", base, self.rest, q),
            _ => format!("{}{}", base, self.rest),
        }
    }
}

/// The gateway routing table.
#[derive(Debug, Default)]
pub struct ServiceRouter {
    routes: HashMap<String, RouteEntry>,
    mount_path: Option<String>,
}

impl ServiceRouter {
    /// Build the router from validated configuration.
    ///
    /// Entries with unparseable base URLs are skipped with an error log;
    /// validation rejects them before this point in normal startup.
    pub fn from_config(configs: &[RouteConfig], mount_path: Option<&str>) -> Self {
        let mut routes = HashMap::with_capacity(configs.len());

        for config in configs {
            let base_url = match Url::parse(&config.base_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(service = %config.name, error = %e, "Invalid base URL, route skipped");
                    continue;
                }
            };
            let public_methods = config
                .public_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
                .collect();

            let entry = RouteEntry {
                name: config.name.clone(),
                base_url,
                public_paths: config.public_paths.iter().map(|p| PathPattern::parse(p)).collect(),
                public_methods,
            };
            tracing::debug!(service = %entry.name, base_url = %entry.base_url, "Route registered");
            routes.insert(config.name.clone(), entry);
        }

        let mount_path = mount_path
            .map(|m| m.trim_end_matches('/').to_string())
            .filter(|m| !m.is_empty());

        Self { routes, mount_path }
    }

    /// Resolve `path` to a service entry.
    ///
    /// Dot segments are removed first, so the public check and the upstream
    /// target both see the path a backend would act on.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<ResolvedRoute<'_>, GatewayError> {
        let normalized = remove_dot_segments(path);
        let path = normalized.as_ref();
        let path = match &self.mount_path {
            Some(mount) => match path.strip_prefix(mount.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => return Err(GatewayError::NotFound(first_segment(path).to_string())),
            },
            None => path,
        };

        let trimmed = path.trim_start_matches('/');
        let (service, rest) = match trimmed.find('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
            None => (trimmed, "/"),
        };

        let entry = self
            .routes
            .get(service)
            .ok_or_else(|| GatewayError::NotFound(service.to_string()))?;

        Ok(ResolvedRoute {
            entry,
            rest: rest.to_string(),
            public: entry.is_public(rest, method),
        })
    }

    /// Service name → base URL, for the health report.
    pub fn services(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.routes.values().map(|e| (e.name.as_str(), &e.base_url))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or_default()
}
