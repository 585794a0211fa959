mod types;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

pub use types::{Location, Resource, Version, default_version};
pub(crate) use types::encode_segment;

/// Capability set every hosting backend implements.
///
/// Listing operations (`list_packages`, `list_files`, and `get_versions` when
/// used for listings) are meant to be consumed through
/// [`CachingBackend`](crate::CachingBackend), which memoizes them. Content and
/// link lookups go straight to the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier used in logs and the health report.
    fn name(&self) -> &'static str;

    /// Fetches the raw bytes of a file at a pinned version.
    async fn get_resource(&self, resource: &Resource, token: Option<&str>) -> Result<Bytes>;

    /// Builds a human-viewable URL for a file, anchored to a line when a
    /// location is given.
    async fn get_resource_link(
        &self,
        resource: &Resource,
        location: Option<Location>,
        token: Option<&str>,
    ) -> Result<String>;

    /// Lists a package's tags in upstream order. The first entry is the default.
    async fn get_versions(&self, package: &str, token: Option<&str>) -> Result<Vec<Version>>;

    /// Lists every package the backend can serve.
    async fn list_packages(&self, token: Option<&str>) -> Result<Vec<String>>;

    /// Lists the files of a package at a version. Paths start with `/`.
    async fn list_files(
        &self,
        package: &str,
        version: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>>;
}
