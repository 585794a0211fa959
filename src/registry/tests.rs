use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Bytes, to_bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::Response;
use forgegate_adapter::{
    Backend, CachingBackend, Error, Location, Resource, Result as BackendResult, Version,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;

/// In-memory backend. Packages named `broken` fail with an upstream error,
/// packages named `private` need a token.
#[derive(Default)]
struct FakeBackend {
    tags: Mutex<HashMap<String, Vec<String>>>,
    files: HashMap<(String, String), Vec<(String, String)>>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl FakeBackend {
    fn with_package(self, package: &str, tags: &[&str]) -> Self {
        self.tags.lock().insert(
            package.to_string(),
            tags.iter().map(|tag| tag.to_string()).collect(),
        );
        self
    }

    fn with_file(mut self, package: &str, version: &str, path: &str, body: &str) -> Self {
        self.files
            .entry((package.to_string(), version.to_string()))
            .or_default()
            .push((path.to_string(), body.to_string()));
        self
    }

    fn push_tag(&self, package: &str, tag: &str) {
        self.tags
            .lock()
            .entry(package.to_string())
            .or_default()
            .insert(0, tag.to_string());
    }

    fn record(&self, token: Option<&str>) {
        self.tokens.lock().push(token.map(str::to_string));
    }

    fn check(&self, package: &str, token: Option<&str>) -> BackendResult<()> {
        match (package, token) {
            ("broken", _) => Err(Error::Upstream {
                status: 500,
                body: "internal details".into(),
            }),
            ("private", None) => Err(Error::NotAuthenticated("token required".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_resource(&self, resource: &Resource, token: Option<&str>) -> BackendResult<Bytes> {
        self.record(token);
        self.check(&resource.package, token)?;
        self.files
            .get(&(resource.package.clone(), resource.version.clone()))
            .and_then(|files| files.iter().find(|(path, _)| *path == resource.path))
            .map(|(_, body)| Bytes::from(body.clone()))
            .ok_or_else(|| Error::NotFound(format!("file {}", resource.path)))
    }

    async fn get_resource_link(
        &self,
        resource: &Resource,
        location: Option<Location>,
        token: Option<&str>,
    ) -> BackendResult<String> {
        self.record(token);
        let anchor = location.map(|location| location.anchor()).unwrap_or_default();
        Ok(format!(
            "https://forge.test/acme/{}/blob/{}{}{}",
            resource.package, resource.version, resource.path, anchor
        ))
    }

    async fn get_versions(&self, package: &str, token: Option<&str>) -> BackendResult<Vec<Version>> {
        self.record(token);
        self.check(package, token)?;
        self.tags
            .lock()
            .get(package)
            .map(|tags| Version::from_tag_names(tags.iter().cloned()))
            .ok_or_else(|| Error::NotFound(format!("package {package}")))
    }

    async fn list_packages(&self, token: Option<&str>) -> BackendResult<Vec<String>> {
        self.record(token);
        let mut names: Vec<String> = self.tags.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_files(
        &self,
        package: &str,
        version: &str,
        token: Option<&str>,
    ) -> BackendResult<Vec<String>> {
        self.record(token);
        Ok(self
            .files
            .get(&(package.to_string(), version.to_string()))
            .map(|files| files.iter().map(|(path, _)| path.clone()).collect())
            .unwrap_or_default())
    }
}

fn fixture() -> FakeBackend {
    FakeBackend::default()
        .with_package("auth", &["v2", "v1"])
        .with_package("empty", &[])
        .with_file("auth", "v2", "/mod.ts", "export const auth = 2;")
        .with_file("auth", "v2", "/lib/session.ts", "export {};")
        .with_file("auth", "v2", "/README.md", "# auth")
}

fn registry_with(backend: FakeBackend, redirect_browsers: bool) -> (Registry, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let cache = Arc::new(CachingBackend::new(backend.clone()));
    (Registry::new(cache, redirect_browsers), backend)
}

fn registry() -> (Registry, Arc<FakeBackend>) {
    registry_with(fixture(), true)
}

fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(name.clone(), HeaderValue::from_static(value));
    }
    map
}

async fn get(registry: &Registry, route: Route, uri: &'static str, headers: &HeaderMap) -> Response {
    registry
        .serve(route, Method::GET, &Uri::from_static(uri), headers)
        .await
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn unpinned_path_redirects_to_default_version() {
    let (registry, _) = registry();
    let response = get(&registry, Route::Resource, "/auth/mod.ts", &HeaderMap::new()).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/auth@v2/mod.ts");
    assert!(response.headers().get(header::AUTHORIZATION).is_none());
}

#[tokio::test]
async fn default_version_redirect_keeps_location_and_token() {
    let (registry, backend) = registry();
    let response = get(
        &registry,
        Route::Resource,
        "/auth/lib/session.ts:10:4",
        &headers(&[(header::AUTHORIZATION, "Bearer s3cret")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth@v2/lib/session.ts:10:4"
    );
    assert_eq!(response.headers()[header::AUTHORIZATION], "Bearer s3cret");
    assert_eq!(
        backend.tokens.lock().as_slice(),
        &[Some("s3cret".to_string())]
    );
}

#[tokio::test]
async fn default_version_follows_newly_pushed_tags() {
    let (registry, backend) = registry();
    let response = get(&registry, Route::Resource, "/auth/mod.ts", &HeaderMap::new()).await;
    assert_eq!(response.headers()[header::LOCATION], "/auth@v2/mod.ts");

    backend.push_tag("auth", "v3");
    let response = get(&registry, Route::Resource, "/auth/mod.ts", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/auth@v3/mod.ts");
    assert_eq!(backend.tokens.lock().len(), 2);
}

#[tokio::test]
async fn anonymous_request_after_authenticated_one_is_rejected() {
    let (registry, _) = registry_with(fixture().with_package("private", &["v1"]), true);

    let response = get(
        &registry,
        Route::Resource,
        "/private/mod.ts",
        &headers(&[(header::AUTHORIZATION, "Bearer alice")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/private@v1/mod.ts");

    let response = get(&registry, Route::Resource, "/private/mod.ts", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn package_without_versions_is_not_found() {
    let (registry, _) = registry();
    let response = get(&registry, Route::Resource, "/empty/mod.ts", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("no versions"));
}

#[tokio::test]
async fn pinned_path_serves_content() {
    let (registry, _) = registry();
    let response = get(&registry, Route::Resource, "/auth@v2/mod.ts", &HeaderMap::new()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/typescript; charset=utf-8"
    );
    assert_eq!(body_text(response).await, "export const auth = 2;");
}

#[tokio::test]
async fn browsers_are_sent_to_the_file_view() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::Resource,
        "/auth@v2/mod.ts:12:3",
        &headers(&[(header::ACCEPT, "text/html,application/xhtml+xml")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://forge.test/acme/auth/blob/v2/mod.ts#L12"
    );
}

#[tokio::test]
async fn browsers_get_plain_text_when_redirects_are_off() {
    let (registry, _) = registry_with(fixture(), false);
    let response = get(
        &registry,
        Route::Resource,
        "/auth@v2/mod.ts",
        &headers(&[(header::ACCEPT, "text/html")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn relative_segments_are_rejected_before_any_lookup() {
    let (registry, backend) = registry();
    for uri in [
        "/auth@v1/../../../othercorp/private/main/secrets.env",
        "/auth@v1/%2e%2e/%2E%2E/othercorp/private/main/secrets.env",
        "/auth/./mod.ts",
    ] {
        let response = get(&registry, Route::Resource, uri, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(backend.tokens.lock().is_empty());
}

#[tokio::test]
async fn extra_version_separator_is_bad_params() {
    let (registry, backend) = registry();
    let response = get(&registry, Route::Resource, "/auth@v2@x/mod.ts", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(backend.tokens.lock().is_empty());
}

#[tokio::test]
async fn encoded_path_is_decoded_before_lookup() {
    let backend = fixture().with_file("auth", "v2", "/my file.ts", "spaced");
    let (registry, _) = registry_with(backend, true);
    let response = get(
        &registry,
        Route::Resource,
        "/auth@v2/my%20file.ts",
        &HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "spaced");

    let response = get(&registry, Route::Resource, "/auth/my%20file.ts", &HeaderMap::new()).await;
    assert_eq!(response.headers()[header::LOCATION], "/auth@v2/my%20file.ts");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let (registry, _) = registry();
    let response = get(&registry, Route::Resource, "/auth@v2/nope.ts", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_paths_are_bad_params() {
    let (registry, _) = registry();
    for uri in ["/auth", "/", "/auth@v2/mod.ts:x"] {
        let response = get(&registry, Route::Resource, uri, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn non_bearer_authorization_is_bad_params() {
    let (registry, backend) = registry();
    let response = get(
        &registry,
        Route::Resource,
        "/auth@v2/mod.ts",
        &headers(&[(header::AUTHORIZATION, "token abc")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(backend.tokens.lock().is_empty());
}

#[tokio::test]
async fn upstream_failures_are_reported_generically() {
    let backend = fixture().with_package("broken", &["v1"]);
    let (registry, _) = registry_with(backend, true);
    let response = get(&registry, Route::Resource, "/broken@v1/mod.ts", &HeaderMap::new()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(!body_text(response).await.contains("internal details"));
}

#[tokio::test]
async fn other_methods_are_rejected() {
    let (registry, backend) = registry();
    let response = registry
        .serve(
            Route::Resource,
            Method::POST,
            &Uri::from_static("/auth@v2/mod.ts"),
            &HeaderMap::new(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(backend.tokens.lock().is_empty());
}

#[tokio::test]
async fn list_packages_returns_items() {
    let (registry, _) = registry();
    let response = get(&registry, Route::ListPackages, "/_list_packages", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"items": ["auth", "empty"]}));
}

#[tokio::test]
async fn list_versions_preselects_default() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::ListVersions,
        "/_list_versions?package=auth",
        &HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"items": ["v2", "v1"], "preselect": "v2"})
    );
}

#[tokio::test]
async fn list_versions_of_unknown_package_is_not_found() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::ListVersions,
        "/_list_versions?package=ghost",
        &HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_versions_requires_package() {
    let (registry, _) = registry();
    let response = get(&registry, Route::ListVersions, "/_list_versions", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_files_returns_relative_paths() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::ListFiles,
        "/_list_files?package=auth&version=v2",
        &HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"items": ["mod.ts", "lib/session.ts", "README.md"]})
    );
}

#[tokio::test]
async fn list_files_of_unknown_tag_is_not_found() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::ListFiles,
        "/_list_files?package=auth&version=v9",
        &HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn discovery_document_points_at_listings() {
    let (registry, _) = registry();
    let response = get(
        &registry,
        Route::Discovery,
        "/.well-known/deno-import-intellisense.json",
        &HeaderMap::new(),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["version"], 2);
    let variables = body["registries"][0]["variables"].as_array().unwrap();
    assert_eq!(variables[0]["url"], "/_list_packages");
    assert_eq!(variables[1]["url"], "/_list_versions?package=${{package}}");
}

#[tokio::test]
async fn health_reports_backend_and_cache() {
    let (registry, backend) = registry();
    get(&registry, Route::Resource, "/auth/mod.ts", &HeaderMap::new()).await;

    let response = get(&registry, Route::Health, "/up", &HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "fake");
    assert_eq!(body["cache"]["tag_listings"], 1);
    assert_eq!(body["cache"]["packages_cached"], Value::Null);
    assert_eq!(backend.tokens.lock().len(), 1);
}
