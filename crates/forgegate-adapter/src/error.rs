use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by a hosting backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Package, version or file does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),
    /// Credentials are required but were missing or rejected upstream.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    /// Any other non-success upstream status; `body` is kept for diagnostics.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decoding upstream response: {0}")]
    Decode(String),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// A name or path segment that cannot be placed into an upstream URL.
    #[error("invalid path segment {0:?}")]
    InvalidPath(String),
    #[error("malformed link header: {0}")]
    MalformedLinkHeader(String),
}
