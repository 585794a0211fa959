use axum::{http::StatusCode, response::Response};
use forgegate_adapter::{CachingBackend, default_version};
use serde::Serialize;
use serde_json::json;
use url::form_urlencoded;

use super::response::respond_json;
use super::types::Outcome;
use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Serialize)]
struct Listing {
    items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preselect: Option<String>,
}

impl Listing {
    fn of(items: Vec<String>) -> Self {
        Self {
            items,
            preselect: None,
        }
    }
}

/// Pulls named, non-empty query parameters out of a raw query string.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_param(query: Option<&str>, name: &str) -> RegistryResult<String> {
    query_param(query, name)
        .ok_or_else(|| RegistryError::BadParams(format!("missing query parameter {name}")))
}

/// Handles `/_list_packages`
pub async fn handle_list_packages(
    cache: &CachingBackend,
    token: Option<&str>,
) -> RegistryResult<(Response, Outcome)> {
    let packages = cache.list_packages(token).await?;
    let resp = respond_json(StatusCode::OK, &Listing::of(packages))?;
    Ok((resp, Outcome::Listing))
}

/// Handles `/_list_versions?package=<p>`
pub async fn handle_list_versions(
    cache: &CachingBackend,
    query: Option<&str>,
    token: Option<&str>,
) -> RegistryResult<(Response, Outcome)> {
    let package = required_param(query, "package")?;
    if !cache.has_package(&package, token).await? {
        return Err(RegistryError::NotFound(format!(
            "package {package} does not exist"
        )));
    }

    let versions = cache.list_tags(&package, token).await?;
    let listing = Listing {
        preselect: default_version(&versions).map(|version| version.name.clone()),
        items: versions.into_iter().map(|version| version.name).collect(),
    };
    let resp = respond_json(StatusCode::OK, &listing)?;
    Ok((resp, Outcome::Listing))
}

/// Handles `/_list_files?package=<p>&version=<v>`
pub async fn handle_list_files(
    cache: &CachingBackend,
    query: Option<&str>,
    token: Option<&str>,
) -> RegistryResult<(Response, Outcome)> {
    let package = required_param(query, "package")?;
    let version = required_param(query, "version")?;
    if !cache.has_tag(&package, &version, token).await? {
        return Err(RegistryError::NotFound(format!(
            "version {version} of package {package} does not exist"
        )));
    }

    // Completion clients expect paths relative to the version root.
    let files = cache
        .list_files(&package, &version, token)
        .await?
        .into_iter()
        .map(|file| file.trim_start_matches('/').to_string())
        .collect();
    let resp = respond_json(StatusCode::OK, &Listing::of(files))?;
    Ok((resp, Outcome::Listing))
}

/// Handles `/.well-known/deno-import-intellisense.json`
pub fn handle_discovery() -> RegistryResult<(Response, Outcome)> {
    let body = json!({
        "version": 2,
        "registries": [{
            "schema": "/:package([a-z0-9_-]*)@:version?/:path*",
            "variables": [
                { "key": "package", "url": "/_list_packages" },
                { "key": "version", "url": "/_list_versions?package=${{package}}" },
                { "key": "path", "url": "/_list_files?package=${{package}}&version=${{version}}" },
            ],
        }],
    });
    let resp = respond_json(StatusCode::OK, &body)?;
    Ok((resp, Outcome::Discovery))
}

/// Handles health check requests. Never calls upstream.
pub fn handle_health(cache: &CachingBackend) -> RegistryResult<(Response, Outcome)> {
    let body = json!({
        "status": "ok",
        "backend": cache.backend().name(),
        "cache": cache.stats(),
    });
    let resp = respond_json(StatusCode::OK, &body)?;
    Ok((resp, Outcome::Health))
}
