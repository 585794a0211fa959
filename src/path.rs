//! Registry path grammar: `/<package>[@<version>]/<filepath>[:<line>[:<column>]]`.

use std::fmt;

use forgegate_adapter::{Location, Resource};
use thiserror::Error;

const PATTERN: &str = "/<package>[@<version>]/<filepath>[:<line>[:<column>]]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("you must specify a package, expected a path pattern of {PATTERN}")]
    MissingPackage,
    #[error("you must specify a filepath, expected a path pattern of {PATTERN}")]
    MissingFilepath,
    #[error("expected {0:?} to be a number, path pattern is {PATTERN}")]
    InvalidNumber(String),
    #[error("a package may be pinned to one version only, expected a path pattern of {PATTERN}")]
    ExtraVersion,
    #[error("relative segment {0:?} is not allowed in registry paths")]
    DotSegment(String),
}

/// A file inside a package, pinned or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    pub package: String,
    /// `None` when the caller did not pin a version.
    pub version: Option<String>,
    /// Always starts with `/` and names more than the root.
    pub path: String,
}

impl ResourceLocator {
    /// The backend view of this locator, if a version was given.
    pub fn pinned(&self) -> Option<Resource> {
        self.version
            .as_ref()
            .map(|version| Resource::new(&self.package, version, &self.path))
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            package: self.package.clone(),
            version: Some(version.into()),
            path: self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub resource: ResourceLocator,
    pub location: Option<Location>,
}

impl ParsedPath {
    /// Same path and location, pinned to `version`.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            resource: self.resource.with_version(version),
            location: self.location,
        }
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.resource.package)?;
        if let Some(version) = &self.resource.version {
            write!(f, "@{version}")?;
        }
        f.write_str(&self.resource.path)?;
        if let Some(location) = self.location {
            write!(f, ":{}:{}", location.line, location.column)?;
        }
        Ok(())
    }
}

pub fn parse_path(raw: &str) -> Result<ParsedPath, PathError> {
    let mut pieces = raw.split(':');
    let full_path = pieces.next().unwrap_or_default();
    let line = parse_number(pieces.next())?;
    let column = parse_number(pieces.next())?;

    let full_path = full_path.strip_prefix('/').unwrap_or(full_path);
    let (head, rest) = full_path.split_once('/').unwrap_or((full_path, ""));
    let (package, version) = match head.split_once('@') {
        Some((_, version)) if version.contains('@') => return Err(PathError::ExtraVersion),
        Some((package, version)) => (package, Some(version)),
        None => (head, None),
    };

    if package.is_empty() {
        return Err(PathError::MissingPackage);
    }
    let path = format!("/{rest}");
    if path == "/" {
        return Err(PathError::MissingFilepath);
    }
    if let Some(segment) = std::iter::once(package)
        .chain(version)
        .chain(rest.split('/'))
        .find(|segment| matches!(*segment, "." | ".."))
    {
        return Err(PathError::DotSegment(segment.to_string()));
    }

    Ok(ParsedPath {
        resource: ResourceLocator {
            package: package.to_string(),
            version: version.filter(|v| !v.is_empty()).map(str::to_string),
            path,
        },
        location: line.map(|line| Location::new(line, column.unwrap_or(0))),
    })
}

fn parse_number(piece: Option<&str>) -> Result<Option<u32>, PathError> {
    match piece {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| PathError::InvalidNumber(value.to_string())),
    }
}
