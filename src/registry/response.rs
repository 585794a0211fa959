use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{RegistryError, RegistryResult};

/// Responds with JSON content
pub fn respond_json<T: Serialize>(status: StatusCode, body: &T) -> RegistryResult<Response> {
    let body = serde_json::to_vec(body).map_err(|err| RegistryError::Internal(err.into()))?;
    Ok((
        status,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

/// Responds with plain text
pub fn respond_text(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.to_owned(),
    )
        .into_response()
}

/// Responds with file content
pub fn respond_content(body: Bytes, content_type: &'static str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        Body::from(body),
    )
        .into_response()
}

/// 302 to `location`, optionally handing the bearer token back to the client.
pub fn respond_redirect(location: &str, token: Option<&str>) -> RegistryResult<Response> {
    let location = HeaderValue::from_str(location).map_err(|err| {
        RegistryError::Internal(anyhow::anyhow!("invalid redirect target {location}: {err}"))
    })?;

    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| RegistryError::BadParams(format!("unusable bearer token: {err}")))?;
        headers.insert(header::AUTHORIZATION, value);
    }
    Ok(response)
}
