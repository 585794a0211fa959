//! GitLab backend: every operation goes through the v4 REST API and is
//! scoped to a project resolved by name.


use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Backend, Error, Location, Resource, Result, Version,
    backend::encode_segment,
    upstream::{UpstreamClient, join},
};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Debug, Clone)]
pub struct GitLabOptions {
    pub url: String,
    /// Namespace used to build links for anonymous browser navigation.
    pub default_namespace: String,
    /// Upper bound on pages walked by project search and listings.
    pub max_pages: usize,
}

impl GitLabOptions {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        Self {
            url: "https://gitlab.com".to_string(),
            default_namespace: default_namespace.into(),
            max_pages: 50,
        }
    }
}

/// A project found by name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub id: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    path: String,
    namespace: Namespace,
}

#[derive(Debug, Deserialize)]
struct ProjectSummary {
    path: String,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct FileBlob {
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GitLabBackend {
    client: UpstreamClient,
    options: GitLabOptions,
}

impl GitLabBackend {
    pub fn new(client: UpstreamClient, options: GitLabOptions) -> Self {
        Self { client, options }
    }

    fn api(&self, path: &str) -> String {
        join(&self.options.url, &format!("/api/v4{path}"))
    }

    fn authorize(request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(TOKEN_HEADER, token)
    }

    /// Finds the project whose path slug equals `package`, walking search
    /// result pages until a match turns up or the pages run out.
    pub async fn resolve_project(&self, package: &str, token: &str) -> Result<ProjectHandle> {
        let mut url = Url::parse_with_params(
            &self.api("/projects"),
            &[("search", package), ("per_page", "100")],
        )?
        .to_string();

        for page in 1..=self.options.max_pages {
            let (projects, next): (Vec<Project>, _) = self
                .client
                .fetch_page(
                    Self::authorize(self.client.get(&url), token),
                    &format!("project search for {package}"),
                )
                .await?;

            if let Some(project) = projects.into_iter().find(|project| project.path == package) {
                debug!(package, page, id = project.id, "resolved gitlab project");
                return Ok(ProjectHandle {
                    id: project.id.to_string(),
                    namespace: project.namespace.full_path,
                });
            }

            match next {
                Some(next) => url = next,
                None => return Err(Error::NotFound(format!("package {package}"))),
            }
        }

        warn!(
            package,
            max_pages = self.options.max_pages,
            "project search still paginating at page cap, giving up"
        );
        Err(Error::NotFound(format!("package {package}")))
    }
}

fn require_token<'a>(token: Option<&'a str>, operation: &str) -> Result<&'a str> {
    token.ok_or_else(|| Error::NotAuthenticated(format!("gitlab requires a token to {operation}")))
}

fn decode_blob(blob: FileBlob, what: &str) -> Result<Bytes> {
    if blob.encoding != "base64" {
        return Ok(Bytes::from(blob.content));
    }

    // Long payloads may arrive wrapped.
    let compact: String = blob.content.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map(Bytes::from)
        .map_err(|err| Error::Decode(format!("{what}: {err}")))
}

#[async_trait]
impl Backend for GitLabBackend {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn get_resource(&self, resource: &Resource, token: Option<&str>) -> Result<Bytes> {
        let token = require_token(token, "fetch files")?;
        // The files API takes the whole path as one segment.
        let encoded = resource.encoded_segments()?.join("%2F");
        let project = self.resolve_project(&resource.package, token).await?;
        let url = Url::parse_with_params(
            &self.api(&format!(
                "/projects/{}/repository/files/{encoded}",
                project.id
            )),
            &[("ref", resource.version.as_str())],
        )?;

        let what = format!(
            "{}@{}{}",
            resource.package, resource.version, resource.path
        );
        let blob: FileBlob = self
            .client
            .fetch_json(Self::authorize(self.client.get(url.as_str()), token), &what)
            .await?;

        decode_blob(blob, &what)
    }

    async fn get_resource_link(
        &self,
        resource: &Resource,
        location: Option<Location>,
        token: Option<&str>,
    ) -> Result<String> {
        let namespace = match token {
            Some(token) => {
                self.resolve_project(&resource.package, token)
                    .await?
                    .namespace
            }
            None => self.options.default_namespace.clone(),
        };

        let namespace = namespace
            .split('/')
            .map(encode_segment)
            .collect::<Result<Vec<_>>>()?
            .join("/");
        let mut link = join(
            &self.options.url,
            &format!(
                "/{namespace}/{}/-/blob/{}/{}",
                encode_segment(&resource.package)?,
                encode_segment(&resource.version)?,
                resource.encoded_segments()?.join("/")
            ),
        );
        if let Some(location) = location {
            link.push_str(&location.anchor());
        }
        Ok(link)
    }

    async fn get_versions(&self, package: &str, token: Option<&str>) -> Result<Vec<Version>> {
        let token = require_token(token, "list versions")?;
        let project = self.resolve_project(package, token).await?;

        let url = self.api(&format!("/projects/{}/repository/tags", project.id));
        let tags: Vec<Tag> = self
            .client
            .fetch_json(
                Self::authorize(self.client.get(&url), token),
                &format!("package {package}"),
            )
            .await?;

        Ok(Version::from_tag_names(tags.into_iter().map(|tag| tag.name)))
    }

    async fn list_packages(&self, token: Option<&str>) -> Result<Vec<String>> {
        let token = require_token(token, "list packages")?;
        let first = Url::parse_with_params(
            &self.api("/projects"),
            &[("membership", "true"), ("simple", "true"), ("per_page", "100")],
        )?;

        let projects: Vec<ProjectSummary> = self
            .client
            .fetch_all(first, self.options.max_pages, "project listing", |request| {
                Self::authorize(request, token)
            })
            .await?;

        Ok(projects.into_iter().map(|project| project.path).collect())
    }

    async fn list_files(
        &self,
        package: &str,
        version: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>> {
        let token = require_token(token, "list files")?;
        let project = self.resolve_project(package, token).await?;

        let first = Url::parse_with_params(
            &self.api(&format!("/projects/{}/repository/tree", project.id)),
            &[("ref", version), ("recursive", "true"), ("per_page", "100")],
        )?;
        let entries: Vec<TreeEntry> = self
            .client
            .fetch_all(
                first,
                self.options.max_pages,
                &format!("{package}@{version}"),
                |request| Self::authorize(request, token),
            )
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| format!("/{}", entry.path))
            .collect())
    }
}
