//! Registry documents: package manifests and file listings.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::diagnostic::{BuildError, Result};

/// The parts of a `package.json` the session cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    /// Package name.
    #[serde(default)]
    pub name: String,
    /// Concrete version (the registry resolves tags like `latest`).
    #[serde(default)]
    pub version: String,
    /// CommonJS entry point.
    #[serde(default)]
    pub main: Option<String>,
    /// ES module entry point.
    #[serde(default)]
    pub module: Option<String>,
    /// UMD entry point.
    #[serde(default, rename = "umd:main")]
    pub umd_main: Option<String>,
    /// Runtime dependencies with their version ranges.
    #[serde(default)]
    pub dependencies: FxHashMap<String, String>,
}

impl PackageManifest {
    /// Parse a manifest fetched from `url`.
    pub fn parse(url: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|source| BuildError::Manifest {
            url: url.to_string(),
            source,
        })
    }

    /// The file to load when the package (or sub-package) root is imported.
    ///
    /// Preference is `module`, then `main`, then `umd:main`, for packages and
    /// sub-packages alike. A leading `./` is dropped.
    pub fn entry_point(&self) -> Option<&str> {
        [&self.module, &self.main, &self.umd_main]
            .into_iter()
            .flatten()
            .map(|entry| entry.trim_start_matches("./"))
            .find(|entry| !entry.is_empty())
    }
}

/// A nested directory carrying its own `package.json` (an exports subpath).
#[derive(Debug, Default)]
pub struct SubPackageMetadata {
    /// Path inside the package, starting with `/`.
    pub path: String,
    /// Fetched the first time this exact subpath is imported.
    pub manifest: RwLock<Option<PackageManifest>>,
}

impl SubPackageMetadata {
    /// A sub-package whose manifest has not been fetched yet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            manifest: RwLock::new(None),
        }
    }

    /// Whether the manifest has been fetched.
    pub fn is_loaded(&self) -> bool {
        self.manifest.read().is_some()
    }
}

/// Everything known about one resolved package.
#[derive(Debug)]
pub struct PackageMetadata {
    /// Package name.
    pub name: String,
    /// Pinned version for the rest of the session.
    pub version: String,
    /// Root manifest.
    pub manifest: PackageManifest,
    /// Every file of the package, rooted at the package (`/index.js`).
    pub files: Vec<String>,
    /// Nested manifests.
    pub sub_packages: Vec<SubPackageMetadata>,
}

impl PackageMetadata {
    /// Find the sub-package rooted exactly at `path`.
    pub fn sub_package(&self, path: &str) -> Option<&SubPackageMetadata> {
        self.sub_packages.iter().find(|sub| sub.path == path)
    }
}

// =============================================================================
// File Listing
// =============================================================================

/// Kind of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory with nested entries.
    Directory,
}

/// One node of the registry's file tree.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingEntry {
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Entry name (no slashes).
    pub name: String,
    /// Children of a directory.
    #[serde(default)]
    pub files: Vec<ListingEntry>,
}

/// The registry's file listing of a package version.
#[derive(Debug, Clone, Deserialize)]
pub struct FileListing {
    /// Top-level entries.
    #[serde(default)]
    pub files: Vec<ListingEntry>,
}

impl FileListing {
    /// Parse a listing fetched from `url`.
    pub fn parse(url: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|source| BuildError::Manifest {
            url: url.to_string(),
            source,
        })
    }

    /// All file paths, depth first, each starting with `/`. Directories are
    /// not listed themselves.
    pub fn flatten(&self) -> Vec<String> {
        fn walk(entries: &[ListingEntry], prefix: &str, out: &mut Vec<String>) {
            for entry in entries {
                let full = format!("{prefix}/{}", entry.name);
                match entry.kind {
                    EntryKind::File => out.push(full),
                    EntryKind::Directory => walk(&entry.files, &full, out),
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.files, "", &mut out);
        out
    }
}
