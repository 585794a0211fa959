//! GitHub backend: raw-content CDN for files, REST API for listings.


use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{RequestBuilder, Url, header::AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Backend, Location, Resource, Result, Version,
    backend::encode_segment,
    upstream::{UpstreamClient, join},
};

#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// Account or organisation owning the package repositories.
    pub user: String,
    pub raw_url: String,
    pub api_url: String,
    pub web_url: String,
    /// Used when a request carries no token of its own.
    pub token: Option<String>,
    pub max_pages: usize,
}

impl GitHubOptions {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            raw_url: "https://raw.githubusercontent.com".to_string(),
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            token: None,
            max_pages: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Tree {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GitHubBackend {
    client: UpstreamClient,
    options: GitHubOptions,
}

impl GitHubBackend {
    pub fn new(client: UpstreamClient, options: GitHubOptions) -> Self {
        Self { client, options }
    }

    fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token.or(self.options.token.as_deref()) {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }

    fn api(&self, path: &str) -> String {
        join(&self.options.api_url, path)
    }

    /// `/<user>/<package>/<infix><version>/<path>` with every piece escaped.
    fn file_path(&self, resource: &Resource, infix: &str) -> Result<String> {
        Ok(format!(
            "/{}/{}/{infix}{}/{}",
            encode_segment(&self.options.user)?,
            encode_segment(&resource.package)?,
            encode_segment(&resource.version)?,
            resource.encoded_segments()?.join("/")
        ))
    }

    fn repo_path(&self, package: &str) -> Result<String> {
        Ok(format!(
            "/repos/{}/{}",
            encode_segment(&self.options.user)?,
            encode_segment(package)?
        ))
    }
}

#[async_trait]
impl Backend for GitHubBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_resource(&self, resource: &Resource, token: Option<&str>) -> Result<Bytes> {
        let url = join(&self.options.raw_url, &self.file_path(resource, "")?);
        debug!(%url, "fetching raw content");

        let what = format!(
            "{}@{}{}",
            resource.package, resource.version, resource.path
        );
        let response = self
            .client
            .send(self.authorize(self.client.get(&url), token), &what)
            .await?;
        Ok(response.bytes().await?)
    }

    async fn get_resource_link(
        &self,
        resource: &Resource,
        location: Option<Location>,
        _token: Option<&str>,
    ) -> Result<String> {
        let mut link = join(&self.options.web_url, &self.file_path(resource, "blob/")?);
        if let Some(location) = location {
            link.push_str(&location.anchor());
        }
        Ok(link)
    }

    async fn get_versions(&self, package: &str, token: Option<&str>) -> Result<Vec<Version>> {
        let url = self.api(&format!("{}/tags", self.repo_path(package)?));
        let tags: Vec<Tag> = self
            .client
            .fetch_json(
                self.authorize(self.client.get(&url), token),
                &format!("package {package}"),
            )
            .await?;

        Ok(Version::from_tag_names(tags.into_iter().map(|tag| tag.name)))
    }

    async fn list_packages(&self, token: Option<&str>) -> Result<Vec<String>> {
        let first = Url::parse_with_params(
            &self.api(&format!("/users/{}/repos", encode_segment(&self.options.user)?)),
            &[("per_page", "100")],
        )?;
        let repos: Vec<Repository> = self
            .client
            .fetch_all(first, self.options.max_pages, "repository listing", |request| {
                self.authorize(request, token)
            })
            .await?;

        Ok(repos.into_iter().map(|repo| repo.name).collect())
    }

    async fn list_files(
        &self,
        package: &str,
        version: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>> {
        let first = Url::parse_with_params(
            &self.api(&format!(
                "{}/git/trees/{}",
                self.repo_path(package)?,
                encode_segment(version)?
            )),
            &[("recursive", "1")],
        )?;
        let tree: Tree = self
            .client
            .fetch_json(
                self.authorize(self.client.get(first.as_str()), token),
                &format!("{package}@{version}"),
            )
            .await?;

        if tree.truncated {
            warn!(package, version, "file tree truncated by upstream");
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| format!("/{}", entry.path))
            .collect())
    }
}
