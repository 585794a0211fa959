use std::time::Instant;

use axum::http::Method;

/// How a request was answered, for request logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unpinned path sent on to its default version.
    DefaultVersion,
    /// Browser sent on to the hosting provider's file view.
    Link,
    Content,
    Listing,
    Discovery,
    Health,
    Error,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::DefaultVersion => write!(f, "default_version"),
            Outcome::Link => write!(f, "link"),
            Outcome::Content => write!(f, "content"),
            Outcome::Listing => write!(f, "listing"),
            Outcome::Discovery => write!(f, "discovery"),
            Outcome::Health => write!(f, "health"),
            Outcome::Error => write!(f, "error"),
        }
    }
}

/// Request context for tracking request lifecycle
pub struct RequestContext {
    pub start: Instant,
    pub method: Method,
    pub path: String,
    pub outcome: Outcome,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            method,
            path: path.into(),
            outcome: Outcome::Error,
        }
    }

    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}
