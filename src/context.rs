//! Per-session build state shared with hooks and generated files.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::cache::{Bytes, Cache};
use crate::compiler::BuildOutput;
use crate::config::RegistryUrls;
use crate::diagnostic::{Diagnostics, Result};
use crate::fetch::Fetcher;
use crate::file::{VirtualFile, VirtualFiles};
use crate::hook::{HookPipeline, SfcCompiler};
use crate::package::{Dependencies, PackageManager};
use crate::preset::Preset;

// =============================================================================
// State Values
// =============================================================================

/// A value of the free-form session state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// Flag.
    Bool(bool),
    /// Number.
    Number(f64),
    /// Text.
    Text(String),
}

impl StateValue {
    /// The flag, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// =============================================================================
// BuildContext
// =============================================================================

/// Everything one session knows.
///
/// Owned by the [`crate::Builder`]. Hooks get `&mut` access in `before_build`
/// and shared access while the compiler runs; everything the load path
/// mutates (cache, package tables, generated-file memo) is interior-mutable.
pub struct BuildContext {
    /// Preset files overlaid with the caller's files.
    pub files: VirtualFiles,
    /// Free-form state, seeded from the session options.
    pub state: FxHashMap<String, StateValue>,
    /// Modules the generated entry file should import.
    pub includes: Vec<String>,
    /// Declared dependency versions.
    pub dependencies: Dependencies,
    /// Active preset.
    pub preset: Arc<dyn Preset>,
    /// Hooks, in registration order.
    pub hooks: HookPipeline,
    /// Fetched bytes, keyed by URL.
    pub cache: Arc<Cache>,
    /// Registry packages of this session.
    pub packages: Arc<PackageManager>,
    /// Registry endpoints.
    pub registry: RegistryUrls,
    /// Transport for registry requests.
    pub fetcher: Arc<dyn Fetcher>,
    /// Single-file component compiler, if the session has one.
    pub sfc: Option<Arc<dyn SfcCompiler>>,
    /// Diagnostics of the last build.
    pub diagnostics: Diagnostics,
    /// Output of the last successful compiler run.
    pub output: Option<BuildOutput>,
    generated: RwLock<FxHashMap<String, Bytes>>,
}

impl BuildContext {
    pub(crate) fn new(
        preset: Arc<dyn Preset>,
        files: VirtualFiles,
        state: FxHashMap<String, StateValue>,
        registry: RegistryUrls,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let mut all = preset.files();
        all.merge(files);

        let packages = Arc::new(PackageManager::new(registry.clone(), Arc::clone(&fetcher)));

        Self {
            files: all,
            state,
            includes: Vec::new(),
            dependencies: preset.dependencies(),
            hooks: preset.hooks(),
            preset,
            cache: Arc::new(Cache::new()),
            packages,
            registry,
            fetcher,
            sfc: None,
            diagnostics: Diagnostics::new(),
            output: None,
            generated: RwLock::new(FxHashMap::default()),
        }
    }

    /// Contents of a virtual file, running its generator on first use.
    ///
    /// Generated content is memoized until the next build starts.
    pub fn contents(&self, path: &str) -> Option<Bytes> {
        match self.files.get(path)? {
            VirtualFile::Static(data) => Some(data.clone()),
            VirtualFile::Generated(generate) => {
                if let Some(data) = self.generated.read().get(path) {
                    return Some(data.clone());
                }
                // Generators may read other files, so the memo is not locked
                // while one runs.
                let data = generate(self);
                let mut memo = self.generated.write();
                Some(memo.entry(path.to_string()).or_insert(data).clone())
            }
        }
    }

    pub(crate) fn reset_generated(&self) {
        self.generated.write().clear();
    }

    /// Add or replace a file.
    pub fn add_file(&mut self, path: impl Into<String>, file: impl Into<VirtualFile>) {
        self.files.insert(path, file);
    }

    /// Register a module for the entry file to import. Duplicates are ignored.
    pub fn add_include(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.includes.contains(&path) {
            self.includes.push(path);
        }
    }

    /// Set a state value.
    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.state.insert(key.into(), value.into());
    }

    /// A state flag; missing or non-boolean values read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.state.get(key).and_then(StateValue::as_bool).unwrap_or(false)
    }

    /// A textual state value.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(StateValue::as_text)
    }

    /// Fetch `url` through the session cache.
    pub fn fetch_cached(&self, url: &str) -> Result<Bytes> {
        self.cache.get_or_fetch(url, || {
            log::debug!("fetch: {url}");
            Ok(self.fetcher.get(url)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::StandardPreset;
    use crate::testing::{MemoryFetcher, registry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(files: VirtualFiles) -> BuildContext {
        BuildContext::new(
            Arc::new(StandardPreset::html()),
            files,
            FxHashMap::default(),
            registry(),
            Arc::new(MemoryFetcher::new()),
        )
    }

    #[test]
    fn test_generated_content_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut files = VirtualFiles::new();
        files.insert(
            "/main.tsx",
            VirtualFile::generated(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.includes.join(",").into()
            }),
        );

        let mut ctx = context(files);
        ctx.add_include("/a.css");
        ctx.add_include("/b.css");
        ctx.add_include("/a.css");

        assert_eq!(ctx.contents("/main.tsx").unwrap().as_text().unwrap(), "/a.css,/b.css");
        ctx.contents("/main.tsx");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        ctx.reset_generated();
        ctx.contents("/main.tsx");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_state_accessors() {
        let mut ctx = context(VirtualFiles::new());
        assert!(!ctx.flag("shadcn/enabled"));
        ctx.set_state("shadcn/enabled", true);
        ctx.set_state("shadcn/theme", "new-york");
        ctx.set_state("retries", 3);

        assert!(ctx.flag("shadcn/enabled"));
        assert_eq!(ctx.text("shadcn/theme"), Some("new-york"));
        assert!(!ctx.flag("shadcn/theme"));
        assert_eq!(ctx.state.get("retries").and_then(StateValue::as_number), Some(3.0));
    }

    #[test]
    fn test_fetch_cached() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add("https://gh.test/a.ts", "export {}");
        let ctx = BuildContext::new(
            Arc::new(StandardPreset::html()),
            VirtualFiles::new(),
            FxHashMap::default(),
            registry(),
            fetcher.clone(),
        );

        ctx.fetch_cached("https://gh.test/a.ts").unwrap();
        ctx.fetch_cached("https://gh.test/a.ts").unwrap();
        assert_eq!(fetcher.requests("https://gh.test/a.ts"), 1);
        assert!(ctx.fetch_cached("https://gh.test/missing.ts").is_err());
    }
}
