use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::{Error, Result};

// Unreserved characters stay, everything else (`/` included) is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes one URL path segment. `.` and `..` are refused: URL
/// resolution would collapse them into the parent path.
pub(crate) fn encode_segment(raw: &str) -> Result<String> {
    if raw == "." || raw == ".." {
        return Err(Error::InvalidPath(raw.to_string()));
    }
    Ok(utf8_percent_encode(raw, SEGMENT).to_string())
}

/// A file inside a package at a pinned version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub package: String,
    pub version: String,
    /// Always starts with `/`.
    pub path: String,
}

impl Resource {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            path: path.into(),
        }
    }

    /// Path without its leading slash, as most upstream APIs expect it.
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Percent-encoded segments of the relative path.
    pub fn encoded_segments(&self) -> Result<Vec<String>> {
        self.relative_path().split('/').map(encode_segment).collect()
    }
}

/// A character position inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Fragment both GitHub and GitLab understand for line highlighting.
    pub fn anchor(&self) -> String {
        format!("#L{}", self.line)
    }
}

/// A tag of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub name: String,
    pub is_default: bool,
}

impl Version {
    /// Turns upstream tag names into descriptors, marking the first one default.
    pub fn from_tag_names<I, S>(names: I) -> Vec<Version>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Version {
                name: name.into(),
                is_default: idx == 0,
            })
            .collect()
    }
}

/// Picks the descriptor flagged default, falling back to the first one.
pub fn default_version(versions: &[Version]) -> Option<&Version> {
    versions
        .iter()
        .find(|version| version.is_default)
        .or_else(|| versions.first())
}
