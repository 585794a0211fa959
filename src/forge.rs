use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{BackendConfig, Config};
use crate::registry::Registry;
use forgegate_adapter::{Backend, CachingBackend, GitHubBackend, GitLabBackend, UpstreamClient};

/// Builds the configured hosting backend on top of one shared HTTP client.
pub fn connect_backend(config: &Config) -> Result<Arc<dyn Backend>> {
    let client =
        UpstreamClient::new(&config.upstream.options()).context("building upstream client")?;

    let backend: Arc<dyn Backend> = match &config.backend {
        BackendConfig::Github(github) => {
            info!(
                user = %github.user,
                api_url = %github.api_url,
                default_token = github.token.is_some(),
                "using github backend"
            );
            Arc::new(GitHubBackend::new(client, github.options()))
        }
        BackendConfig::Gitlab(gitlab) => {
            info!(
                url = %gitlab.url,
                default_namespace = %gitlab.default_namespace,
                max_pages = gitlab.max_pages,
                "using gitlab backend"
            );
            Arc::new(GitLabBackend::new(client, gitlab.options()))
        }
    };
    Ok(backend)
}

/// Wraps the configured backend in the listing cache and the request handler.
pub fn build_registry(config: &Config) -> Result<Registry> {
    let backend = connect_backend(config)?;
    let cache = Arc::new(CachingBackend::new(backend));
    Ok(Registry::new(cache, config.server.redirect_browsers))
}
