use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forgegate_adapter::Error as BackendError;
use thiserror::Error;
use tracing::error;

use crate::path::PathError;
use crate::registry::response::respond_text;

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Request-level failures, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    NotAuthenticated(String),
    #[error("{0}")]
    NotFound(String),
    /// Carries upstream detail for the log; callers only see a generic message.
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadParams(_) => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in request logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::NotAuthenticated(_) => "not_authenticated",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream",
            Self::Internal(_) => "internal",
        }
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(_) => "upstream service returned an unexpected response".to_string(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<PathError> for RegistryError {
    fn from(err: PathError) -> Self {
        Self::BadParams(err.to_string())
    }
}

impl From<BackendError> for RegistryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => Self::NotFound(format!("{what} does not exist")),
            BackendError::NotAuthenticated(message) => Self::NotAuthenticated(message),
            err @ BackendError::InvalidPath(_) => Self::BadParams(err.to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(detail) => error!(error = %detail, "upstream failure"),
            Self::Internal(err) => error!(error = ?err, "internal failure"),
            _ => {}
        }
        respond_text(self.status(), &self.public_message())
    }
}
