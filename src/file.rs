//! In-memory source files of a session.
//!
//! A [`VirtualFile`] is either fixed content or a generator evaluated against
//! the [`BuildContext`] when the compiler first loads it. Generators see the
//! context after every hook's `before_build` ran, so an entry module can
//! import the stylesheets hooks registered in [`BuildContext::includes`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::Bytes;
use crate::context::BuildContext;

/// Content generator of a [`VirtualFile::Generated`] file.
pub type Generator = Arc<dyn Fn(&BuildContext) -> Bytes + Send + Sync>;

/// One file of the virtual file set.
#[derive(Clone)]
pub enum VirtualFile {
    /// Fixed content.
    Static(Bytes),
    /// Content computed from the context, at most once per build.
    Generated(Generator),
}

impl VirtualFile {
    /// A generated file.
    ///
    /// ```
    /// use virtual_bundler::file::VirtualFile;
    ///
    /// let entry = VirtualFile::generated(|ctx| {
    ///     ctx.includes
    ///         .iter()
    ///         .map(|path| format!("import '{path}';\n"))
    ///         .collect::<String>()
    ///         .into()
    /// });
    /// assert!(entry.is_generated());
    /// ```
    pub fn generated<F>(generator: F) -> Self
    where
        F: Fn(&BuildContext) -> Bytes + Send + Sync + 'static,
    {
        Self::Generated(Arc::new(generator))
    }

    /// Whether the content is computed.
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    /// Fixed content, if any.
    pub fn as_static(&self) -> Option<&Bytes> {
        match self {
            Self::Static(data) => Some(data),
            Self::Generated(_) => None,
        }
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(data) => f.debug_tuple("Static").field(data).finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl From<Bytes> for VirtualFile {
    fn from(data: Bytes) -> Self {
        Self::Static(data)
    }
}

impl From<&str> for VirtualFile {
    fn from(text: &str) -> Self {
        Self::Static(text.into())
    }
}

impl From<String> for VirtualFile {
    fn from(text: String) -> Self {
        Self::Static(text.into())
    }
}

impl From<Vec<u8>> for VirtualFile {
    fn from(data: Vec<u8>) -> Self {
        Self::Static(data.into())
    }
}

// =============================================================================
// VirtualFiles
// =============================================================================

/// Path-keyed set of virtual files.
///
/// Paths are absolute (`/app.tsx`). The key set is kept alongside the map so
/// the resolver can borrow it directly.
#[derive(Debug, Clone, Default)]
pub struct VirtualFiles {
    files: FxHashMap<String, VirtualFile>,
    paths: FxHashSet<String>,
}

impl VirtualFiles {
    /// Empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file, returning the previous one.
    pub fn insert(&mut self, path: impl Into<String>, file: impl Into<VirtualFile>) -> Option<VirtualFile> {
        let path = path.into();
        self.paths.insert(path.clone());
        self.files.insert(path, file.into())
    }

    /// Remove a file.
    pub fn remove(&mut self, path: &str) -> Option<VirtualFile> {
        self.paths.remove(path);
        self.files.remove(path)
    }

    /// Look up a file.
    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(path)
    }

    /// Whether `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// All paths, for resolution.
    pub fn paths(&self) -> &FxHashSet<String> {
        &self.paths
    }

    /// Iterate over `(path, file)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VirtualFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Overlay `other` on top of this set; files in `other` win.
    pub fn merge(&mut self, other: VirtualFiles) {
        for (path, file) in other.files {
            self.insert(path, file);
        }
    }
}

impl<P, F> FromIterator<(P, F)> for VirtualFiles
where
    P: Into<String>,
    F: Into<VirtualFile>,
{
    fn from_iter<I: IntoIterator<Item = (P, F)>>(iter: I) -> Self {
        let mut files = Self::new();
        files.extend(iter);
        files
    }
}

impl<P, F> Extend<(P, F)> for VirtualFiles
where
    P: Into<String>,
    F: Into<VirtualFile>,
{
    fn extend<I: IntoIterator<Item = (P, F)>>(&mut self, iter: I) {
        for (path, file) in iter {
            self.insert(path, file);
        }
    }
}
