use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

pub mod backend;
pub mod logging;
pub mod server;
pub mod upstream;


pub use backend::{BackendConfig, GithubConfig, GitlabConfig};
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

pub const DEFAULT_CONFIG_FILE: &str = "forgegate.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let candidate = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if candidate.exists() {
            let raw = fs::read_to_string(&candidate)
                .with_context(|| format!("failed to read config {}", candidate.display()))?;
            toml::from_str::<Config>(&raw)
                .with_context(|| format!("invalid config {}", candidate.display()))?
        } else {
            tracing::warn!(
                path = %candidate.display(),
                "configuration file not found, using defaults"
            );
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Layers environment-style overrides on top of the file values. `lookup`
    /// is `std::env::var` outside of tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.logging.otlp_endpoint.is_none() {
            self.logging.otlp_endpoint =
                lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty());
        }

        match &mut self.backend {
            BackendConfig::Github(github) => {
                if let Some(token) = lookup("FORGEGATE_GITHUB_TOKEN").filter(|v| !v.is_empty()) {
                    github.token = Some(token);
                }
                if let Some(user) = lookup("FORGEGATE_GITHUB_USER").filter(|v| !v.is_empty()) {
                    github.user = user;
                }
            }
            BackendConfig::Gitlab(gitlab) => {
                if let Some(namespace) =
                    lookup("FORGEGATE_GITLAB_NAMESPACE").filter(|v| !v.is_empty())
                {
                    gitlab.default_namespace = namespace;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be greater than zero");
        }
        if let Some(endpoint) = &self.logging.otlp_endpoint {
            let url = Url::parse(endpoint)
                .with_context(|| format!("invalid logging.otlp_endpoint {endpoint}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("logging.otlp_endpoint must be an http(s) URL, got {endpoint}");
            }
        }
        self.backend.validate()
    }
}
