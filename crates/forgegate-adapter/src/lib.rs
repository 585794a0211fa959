mod backend;
mod caching;
mod error;
pub mod github;
pub mod gitlab;
pub mod paginate;
mod upstream;

pub use backend::{Backend, Location, Resource, Version, default_version};
pub use caching::{CacheStats, CachingBackend};
pub use error::{Error, Result};
pub use github::{GitHubBackend, GitHubOptions};
pub use gitlab::{GitLabBackend, GitLabOptions, ProjectHandle};
pub use upstream::{UpstreamClient, UpstreamOptions};

#[cfg(test)]
mod test_support;
