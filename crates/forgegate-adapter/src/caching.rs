
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::{Backend, Location, Resource, Result, Version};

type FileKey = (String, String);

/// In-process memo of upstream listings in front of a [`Backend`].
///
/// Package and tag listings are cached for the life of the instance and only
/// ever replaced wholesale by a forced refresh. A lookup that misses on a
/// warm cache triggers exactly one refresh before answering, so packages and
/// tags created after the last refresh are still found. Content, links and
/// [`CachingBackend::get_versions`] always go upstream.
///
/// Concurrent refreshes of the same entry are not coalesced; the last one to
/// finish wins.
pub struct CachingBackend {
    inner: Arc<dyn Backend>,
    packages: RwLock<Option<Arc<BTreeSet<String>>>>,
    tags: RwLock<HashMap<String, Arc<Vec<Version>>>>,
    files: RwLock<HashMap<FileKey, Arc<Vec<String>>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// `None` until the package listing has been fetched once.
    pub packages_cached: Option<usize>,
    pub tag_listings: usize,
    pub file_listings: usize,
}

impl CachingBackend {
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            packages: RwLock::new(None),
            tags: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.inner.as_ref()
    }

    pub async fn get_resource(&self, resource: &Resource, token: Option<&str>) -> Result<Bytes> {
        self.inner.get_resource(resource, token).await
    }

    pub async fn get_resource_link(
        &self,
        resource: &Resource,
        location: Option<Location>,
        token: Option<&str>,
    ) -> Result<String> {
        self.inner.get_resource_link(resource, location, token).await
    }

    /// Always asks upstream with the caller's token; the answer also replaces
    /// the cached tag listing of `package`.
    pub async fn get_versions(&self, package: &str, token: Option<&str>) -> Result<Vec<Version>> {
        Ok(self.refresh_tags(package, token).await?.as_ref().clone())
    }

    pub async fn list_packages(&self, token: Option<&str>) -> Result<Vec<String>> {
        let cached = self.packages.read().clone();
        let packages = match cached {
            Some(packages) => packages,
            None => self.refresh_packages(token).await?,
        };
        Ok(packages.iter().cloned().collect())
    }

    pub async fn has_package(&self, name: &str, token: Option<&str>) -> Result<bool> {
        let cached = self.packages.read().as_ref().map(|set| set.contains(name));
        match cached {
            Some(true) => return Ok(true),
            Some(false) => {}
            None => {
                if self.refresh_packages(token).await?.contains(name) {
                    return Ok(true);
                }
            }
        }

        // One extra look for packages created since the last refresh.
        Ok(self.refresh_packages(token).await?.contains(name))
    }

    pub async fn list_tags(&self, package: &str, token: Option<&str>) -> Result<Vec<Version>> {
        let cached = self.tags.read().get(package).cloned();
        let tags = match cached {
            Some(tags) => tags,
            None => self.refresh_tags(package, token).await?,
        };
        Ok(tags.as_ref().clone())
    }

    pub async fn has_tag(&self, package: &str, tag: &str, token: Option<&str>) -> Result<bool> {
        let contains = |tags: &[Version]| tags.iter().any(|version| version.name == tag);

        let cached = self.tags.read().get(package).map(|tags| contains(tags.as_slice()));
        match cached {
            Some(true) => return Ok(true),
            Some(false) => {}
            None => {
                if contains(self.refresh_tags(package, token).await?.as_slice()) {
                    return Ok(true);
                }
            }
        }

        Ok(contains(self.refresh_tags(package, token).await?.as_slice()))
    }

    /// Files of a pinned version never change, so one fetch per version is enough.
    pub async fn list_files(
        &self,
        package: &str,
        version: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>> {
        let key = (package.to_string(), version.to_string());
        let cached = self.files.read().get(&key).cloned();
        if let Some(files) = cached {
            return Ok(files.as_ref().clone());
        }

        let files = Arc::new(self.inner.list_files(package, version, token).await?);
        debug!(package, version, count = files.len(), "file listing cached");
        self.files.write().insert(key, files.clone());
        Ok(files.as_ref().clone())
    }

    /// Drops every cached listing.
    pub fn invalidate(&self) {
        *self.packages.write() = None;
        self.tags.write().clear();
        self.files.write().clear();
    }

    /// Drops the tag and file listings of one package.
    pub fn invalidate_package(&self, package: &str) {
        self.tags.write().remove(package);
        self.files.write().retain(|(name, _), _| name != package);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            packages_cached: self.packages.read().as_ref().map(|set| set.len()),
            tag_listings: self.tags.read().len(),
            file_listings: self.files.read().len(),
        }
    }

    async fn refresh_packages(&self, token: Option<&str>) -> Result<Arc<BTreeSet<String>>> {
        let packages: Arc<BTreeSet<String>> =
            Arc::new(self.inner.list_packages(token).await?.into_iter().collect());
        debug!(
            backend = self.inner.name(),
            count = packages.len(),
            "package listing refreshed"
        );
        *self.packages.write() = Some(packages.clone());
        Ok(packages)
    }

    async fn refresh_tags(&self, package: &str, token: Option<&str>) -> Result<Arc<Vec<Version>>> {
        let tags = Arc::new(self.inner.get_versions(package, token).await?);
        debug!(
            backend = self.inner.name(),
            package,
            count = tags.len(),
            "tag listing refreshed"
        );
        self.tags.write().insert(package.to_string(), tags.clone());
        Ok(tags)
    }
}
