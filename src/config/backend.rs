use anyhow::{Result, bail};
use forgegate_adapter::{GitHubOptions, GitLabOptions};
use serde::Deserialize;
use url::Url;

/// Hosting backend selection, tagged by `kind` in the `[backend]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Github(GithubConfig),
    Gitlab(GitlabConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Github(GithubConfig::default())
    }
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Github(_) => "github",
            Self::Gitlab(_) => "gitlab",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Github(github) => {
                if github.user.trim().is_empty() {
                    bail!("backend.user is required for the github backend");
                }
                for url in [&github.raw_url, &github.api_url, &github.web_url] {
                    validate_url(url)?;
                }
                if github.max_pages == 0 {
                    bail!("backend.max_pages must be greater than zero");
                }
            }
            Self::Gitlab(gitlab) => {
                if gitlab.default_namespace.trim().is_empty() {
                    bail!("backend.default_namespace is required for the gitlab backend");
                }
                validate_url(&gitlab.url)?;
                if gitlab.max_pages == 0 {
                    bail!("backend.max_pages must be greater than zero");
                }
            }
        }
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|err| anyhow::anyhow!("invalid backend url {raw}: {err}"))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        bail!("unsupported backend scheme {raw}");
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// Account whose repositories are published.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "GithubConfig::default_raw_url")]
    pub raw_url: String,
    #[serde(default = "GithubConfig::default_api_url")]
    pub api_url: String,
    #[serde(default = "GithubConfig::default_web_url")]
    pub web_url: String,
    #[serde(default = "GithubConfig::default_max_pages")]
    pub max_pages: usize,
}

impl GithubConfig {
    fn default_raw_url() -> String {
        "https://raw.githubusercontent.com".to_string()
    }

    fn default_api_url() -> String {
        "https://api.github.com".to_string()
    }

    fn default_web_url() -> String {
        "https://github.com".to_string()
    }

    fn default_max_pages() -> usize {
        10
    }

    pub fn options(&self) -> GitHubOptions {
        GitHubOptions {
            user: self.user.clone(),
            raw_url: self.raw_url.clone(),
            api_url: self.api_url.clone(),
            web_url: self.web_url.clone(),
            token: self.token.clone(),
            max_pages: self.max_pages,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            token: None,
            raw_url: Self::default_raw_url(),
            api_url: Self::default_api_url(),
            web_url: Self::default_web_url(),
            max_pages: Self::default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabConfig {
    #[serde(default = "GitlabConfig::default_url")]
    pub url: String,
    /// Namespace used for browser links when the request carries no token.
    #[serde(default)]
    pub default_namespace: String,
    #[serde(default = "GitlabConfig::default_max_pages")]
    pub max_pages: usize,
}

impl GitlabConfig {
    fn default_url() -> String {
        "https://gitlab.com".to_string()
    }

    fn default_max_pages() -> usize {
        50
    }

    pub fn options(&self) -> GitLabOptions {
        GitLabOptions {
            url: self.url.clone(),
            default_namespace: self.default_namespace.clone(),
            max_pages: self.max_pages,
        }
    }
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            default_namespace: String::new(),
            max_pages: Self::default_max_pages(),
        }
    }
}
