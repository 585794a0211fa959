mod handlers;
pub(crate) mod response;
mod types;
mod utils;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use forgegate_adapter::{CachingBackend, default_version};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::path::parse_path;

pub use types::{Outcome, RequestContext};

/// Characters re-encoded when a decoded path goes back into a `Location` header.
const LOCATION_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Same for provider links, which keep their own escapes and anchor.
const LINK: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Which handler an inbound request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    Discovery,
    ListPackages,
    ListVersions,
    ListFiles,
    Resource,
}

/// Request handler sitting in front of the cached backend.
#[derive(Clone)]
pub struct Registry {
    cache: Arc<CachingBackend>,
    redirect_browsers: bool,
}

impl Registry {
    pub fn new(cache: Arc<CachingBackend>, redirect_browsers: bool) -> Self {
        Self {
            cache,
            redirect_browsers,
        }
    }

    pub fn cache(&self) -> &CachingBackend {
        &self.cache
    }

    /// Answers one request and logs how it went.
    pub async fn serve(
        &self,
        route: Route,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Response {
        let mut ctx = RequestContext::new(method, uri.path());

        let result = if ctx.method != Method::GET && ctx.method != Method::HEAD {
            Ok((
                response::respond_text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
                Outcome::Error,
            ))
        } else {
            self.dispatch(route, uri, headers).await
        };

        match result {
            Ok((resp, outcome)) => {
                ctx.outcome = outcome;
                info!(
                    summary = %ctx.summary(),
                    response_code = resp.status().as_u16(),
                    duration_ms = ctx.start.elapsed().as_millis() as u64,
                    outcome = %ctx.outcome,
                    "request handled"
                );
                resp
            }
            Err(err) => {
                ctx.outcome = Outcome::Error;
                let status = err.status();
                let kind = err.kind();
                let resp = err.into_response();
                warn!(
                    summary = %ctx.summary(),
                    response_code = status.as_u16(),
                    duration_ms = ctx.start.elapsed().as_millis() as u64,
                    error_kind = kind,
                    outcome = %ctx.outcome,
                    "request failed"
                );
                resp
            }
        }
    }

    async fn dispatch(
        &self,
        route: Route,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> RegistryResult<(Response, Outcome)> {
        match route {
            Route::Health => handlers::handle_health(&self.cache),
            Route::Discovery => handlers::handle_discovery(),
            Route::ListPackages => {
                let token = utils::bearer_token(headers)?;
                handlers::handle_list_packages(&self.cache, token.as_deref()).await
            }
            Route::ListVersions => {
                let token = utils::bearer_token(headers)?;
                handlers::handle_list_versions(&self.cache, uri.query(), token.as_deref()).await
            }
            Route::ListFiles => {
                let token = utils::bearer_token(headers)?;
                handlers::handle_list_files(&self.cache, uri.query(), token.as_deref()).await
            }
            Route::Resource => self.resolve(uri.path(), headers).await,
        }
    }

    /// Resolves a registry path into a redirect or file content.
    pub async fn resolve(
        &self,
        raw_path: &str,
        headers: &HeaderMap,
    ) -> RegistryResult<(Response, Outcome)> {
        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| RegistryError::BadParams("path is not valid UTF-8".into()))?;
        let parsed = parse_path(&decoded)?;
        let token = utils::bearer_token(headers)?;
        let token = token.as_deref();

        let Some(resource) = parsed.resource.pinned() else {
            let package = &parsed.resource.package;
            let versions = self.cache.get_versions(package, token).await?;
            let version = default_version(&versions).ok_or_else(|| {
                RegistryError::NotFound(format!("package {package} has no versions"))
            })?;

            let target = parsed.with_version(&version.name).to_string();
            debug!(package = %package, version = %version.name, "redirecting to default version");
            let location = utf8_percent_encode(&target, LOCATION_PATH).to_string();
            let resp = response::respond_redirect(&location, token)?;
            return Ok((resp, Outcome::DefaultVersion));
        };

        let expects_html = utils::expects_html(headers);
        if expects_html && self.redirect_browsers {
            let link = self
                .cache
                .get_resource_link(&resource, parsed.location, token)
                .await?;
            let link = utf8_percent_encode(&link, LINK).to_string();
            let resp = response::respond_redirect(&link, None)?;
            return Ok((resp, Outcome::Link));
        }

        let content = self.cache.get_resource(&resource, token).await?;
        let content_type = utils::content_type(&resource.path, expects_html);
        Ok((response::respond_content(content, content_type), Outcome::Content))
    }
}
