//! Public-path matching.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A pattern ending in `*` is a prefix match, anything else is exact
//! - No regex to guarantee O(n) matching
//! - Patterns are matched against paths with dot segments already removed,
//!   so `/docs/../admin` cannot borrow the exemption of `/docs/*`

use std::borrow::Cow;
use std::fmt;

/// A path (relative to the service) that is exempt from authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    /// Compile a configured pattern string.
    pub fn parse(pattern: &str) -> Self {
        let normalized = normalize(pattern);
        match normalized.strip_suffix('*') {
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(normalized),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => {
                // "/login" and "/login/" name the same endpoint.
                path == expected || path.strip_suffix('/') == Some(expected.as_str())
            }
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => write!(f, "{}", p),
            PathPattern::Prefix(p) => write!(f, "{}*", p),
        }
    }
}

/// Remove `.` and `..` segments (RFC 3986 §5.2.4), including their
/// percent-encoded forms. `..` never climbs above the root.
pub fn remove_dot_segments(path: &str) -> Cow<'_, str> {
    if !path.split('/').any(|seg| dot_segment(seg).is_some()) {
        return Cow::Borrowed(path);
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut ends_in_dir = false;
    for seg in path.trim_start_matches('/').split('/') {
        ends_in_dir = true;
        match dot_segment(seg) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                kept.pop();
            }
            None => {
                kept.push(seg);
                ends_in_dir = false;
            }
        }
    }

    let mut out = String::with_capacity(path.len());
    for seg in &kept {
        out.push('/');
        out.push_str(seg);
    }
    if ends_in_dir || out.is_empty() {
        out.push('/');
    }
    Cow::Owned(out)
}

enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(seg: &str) -> Option<DotSegment> {
    if seg.len() > 6 {
        return None;
    }
    match seg.to_ascii_lowercase().replace("%2e", ".").as_str() {
        "." => Some(DotSegment::Current),
        ".." => Some(DotSegment::Parent),
        _ => None,
    }
}

fn normalize(pattern: &str) -> String {
    let trimmed = pattern.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
