//! Lazy registry package resolution.
//!
//! Bare imports (`react`, `react-dom/client`, `@scope/pkg/sub`) are mapped to
//! concrete files in a synthetic `/node_modules/` namespace. Packages are
//! discovered on first reference:
//!
//! 1. Fetch `{npm}/{name}@{version}/package.json` and pin the concrete version
//! 2. Fetch `{data}/{name}@{version}` and register every file as
//!    `/node_modules/{name}{file}` so the resolver can see it
//! 3. Rewrite the import to the manifest's entry point
//!
//! File contents are fetched only when the compiler loads them, and cached
//! by URL in the session [`Cache`].
//!
//! # Versions
//!
//! The version comes from the session's declared dependencies, else from a
//! version implied by a previously fetched manifest, else `latest`. Once a
//! package is loaded its version is pinned for the session: later requests
//! for another version resolve to the pinned one.

mod manifest;

pub use manifest::{
    EntryKind, FileListing, ListingEntry, PackageManifest, PackageMetadata, SubPackageMetadata,
};

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::{Bytes, Cache};
use crate::config::RegistryUrls;
use crate::diagnostic::{BuildError, Result};
use crate::fetch::Fetcher;
use crate::resolve::{NODE_MODULES, file_name, split_package};

/// Version requested when nothing else is known.
pub const LATEST: &str = "latest";

/// Declared dependency versions, by package name.
pub type Dependencies = FxHashMap<String, String>;

/// Resolves and loads registry packages for one session.
pub struct PackageManager {
    registry: RegistryUrls,
    fetcher: Arc<dyn Fetcher>,
    /// Versions implied by fetched manifests.
    implied: RwLock<FxHashMap<String, String>>,
    packages: RwLock<FxHashMap<String, Arc<PackageMetadata>>>,
    paths: RwLock<FxHashSet<String>>,
}

impl PackageManager {
    /// Create a package manager talking to `registry` through `fetcher`.
    pub fn new(registry: RegistryUrls, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            registry,
            fetcher,
            implied: RwLock::new(FxHashMap::default()),
            packages: RwLock::new(FxHashMap::default()),
            paths: RwLock::new(FxHashSet::default()),
        }
    }

    /// Every registered `/node_modules/...` file path.
    ///
    /// Drop the guard before calling [`Self::process_path`], which registers
    /// new paths.
    pub fn paths(&self) -> RwLockReadGuard<'_, FxHashSet<String>> {
        self.paths.read()
    }

    /// Metadata of a loaded package.
    pub fn package(&self, name: &str) -> Option<Arc<PackageMetadata>> {
        self.packages.read().get(name).cloned()
    }

    /// `(name, pinned version)` of every loaded package, sorted by name.
    pub fn packages(&self) -> Vec<(String, String)> {
        let mut list: Vec<_> = self
            .packages
            .read()
            .values()
            .map(|meta| (meta.name.clone(), meta.version.clone()))
            .collect();
        list.sort();
        list
    }

    /// Version implied for `name` by fetched manifests.
    pub fn implied_version(&self, name: &str) -> Option<String> {
        self.implied.read().get(name).cloned()
    }

    /// Rewrite a bare package specifier to a concrete `/node_modules/` path.
    ///
    /// Returns `Ok(None)` for relative, absolute and alias specifiers, which
    /// the caller keeps as they are.
    pub fn process_path(&self, declared: &Dependencies, spec: &str) -> Result<Option<String>> {
        let Some(pkg) = split_package(spec) else {
            return Ok(None);
        };

        let meta = self.load_package(declared, &pkg.name)?;
        self.load_sub_package(&meta, &pkg.path)?;
        let rewritten = rewrite(&meta, &pkg.path)?;

        log::debug!("package: {spec} -> {}@{}{rewritten}", meta.name, meta.version);
        Ok(Some(format!("{NODE_MODULES}{}{rewritten}", pkg.name)))
    }

    /// Load the bytes of a `/node_modules/{name}{path}` file.
    ///
    /// The package must have been loaded through [`Self::process_path`].
    pub fn load_file(&self, cache: &Cache, path: &str) -> Result<Bytes> {
        let pkg = split_package(path).ok_or_else(|| BuildError::InvalidPackagePath {
            path: path.to_string(),
        })?;
        let meta = self
            .package(&pkg.name)
            .ok_or_else(|| BuildError::UnknownPackage { name: pkg.name.clone() })?;

        let url = self.registry.package_file(&meta.name, &meta.version, &pkg.path);
        cache.get_or_fetch(&url, || Ok(self.fetcher.get(&url)?))
    }

    fn load_package(&self, declared: &Dependencies, name: &str) -> Result<Arc<PackageMetadata>> {
        if let Some(meta) = self.package(name) {
            if let Some(wanted) = declared.get(name)
                && wanted != &meta.version
                && wanted != LATEST
            {
                log::warn!(
                    "package {name}: requested {wanted}, keeping pinned version {}",
                    meta.version
                );
            }
            return Ok(meta);
        }

        let version = declared
            .get(name)
            .cloned()
            .or_else(|| self.implied_version(name))
            .unwrap_or_else(|| LATEST.to_string());

        let manifest = self.fetch_manifest(name, &version, "")?;
        let files = self.fetch_files(name, &manifest.version)?;

        let sub_packages = files
            .iter()
            .filter_map(|file| match file_name(file) {
                (base, "package.json") if !base.is_empty() => Some(SubPackageMetadata::new(base)),
                _ => None,
            })
            .collect();

        let meta = Arc::new(PackageMetadata {
            name: name.to_string(),
            version: manifest.version.clone(),
            manifest,
            files,
            sub_packages,
        });

        // A concurrent first reference may have won the race; keep its entry
        // so the pinned version never changes.
        let meta = {
            let mut packages = self.packages.write();
            Arc::clone(packages.entry(name.to_string()).or_insert(meta))
        };

        let mut paths = self.paths.write();
        for file in &meta.files {
            paths.insert(format!("{NODE_MODULES}{name}{file}"));
        }

        log::debug!("package: loaded {name}@{} ({} files)", meta.version, meta.files.len());
        Ok(meta)
    }

    fn load_sub_package(&self, meta: &PackageMetadata, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        let Some(sub) = meta.sub_package(path) else {
            return Ok(());
        };
        if sub.is_loaded() {
            return Ok(());
        }

        let manifest = self.fetch_manifest(&meta.name, &meta.version, path)?;
        let mut slot = sub.manifest.write();
        if slot.is_none() {
            *slot = Some(manifest);
        }
        Ok(())
    }

    fn fetch_manifest(&self, name: &str, version: &str, subpath: &str) -> Result<PackageManifest> {
        let url = self.registry.manifest(name, version, subpath);
        let data = self.fetcher.get(&url)?;
        let manifest = PackageManifest::parse(&url, &data)?;

        let mut implied = self.implied.write();
        if subpath.is_empty() {
            implied.insert(name.to_string(), manifest.version.clone());
        }
        for (dep, range) in &manifest.dependencies {
            implied.insert(dep.clone(), range.clone());
        }

        Ok(manifest)
    }

    fn fetch_files(&self, name: &str, version: &str) -> Result<Vec<String>> {
        let url = self.registry.listing(name, version);
        let data = self.fetcher.get(&url)?;
        Ok(FileListing::parse(&url, &data)?.flatten())
    }
}

/// Point a package-relative path at a concrete file.
fn rewrite(meta: &PackageMetadata, path: &str) -> Result<String> {
    if path.is_empty() {
        let entry = meta
            .manifest
            .entry_point()
            .ok_or_else(|| BuildError::MissingEntryPoint {
                package: meta.name.clone(),
                path: String::new(),
            })?;
        return Ok(format!("/{entry}"));
    }

    let Some(sub) = meta.sub_package(path) else {
        return Ok(path.to_string());
    };

    let manifest = sub.manifest.read();
    let manifest = manifest.as_ref().ok_or_else(|| BuildError::MissingManifest {
        package: meta.name.clone(),
        path: path.to_string(),
    })?;
    let entry = manifest
        .entry_point()
        .ok_or_else(|| BuildError::MissingEntryPoint {
            package: meta.name.clone(),
            path: path.to_string(),
        })?;

    Ok(format!("{path}/{entry}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryFetcher, registry};

    fn deps(pairs: &[(&str, &str)]) -> Dependencies {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn manager(fetcher: &Arc<MemoryFetcher>) -> PackageManager {
        PackageManager::new(registry(), fetcher.clone())
    }

    #[test]
    fn test_non_package_specifiers() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let pm = manager(&fetcher);
        for spec in ["./app", "../x", "/main.tsx", "@/components/ui/button"] {
            assert_eq!(pm.process_path(&Dependencies::default(), spec).unwrap(), None);
        }
        assert_eq!(fetcher.total_requests(), 0);
    }

    #[test]
    fn test_latest_package_resolves_to_entry() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("left-pad", "1.3.0", r#""main": "index.js""#, &["/index.js", "/package.json"]);
        let pm = manager(&fetcher);

        let path = pm.process_path(&Dependencies::default(), "left-pad").unwrap();
        assert_eq!(path.as_deref(), Some("/node_modules/left-pad/index.js"));
        assert_eq!(fetcher.requests(&registry().manifest("left-pad", "latest", "")), 1);
        assert_eq!(fetcher.requests(&registry().listing("left-pad", "1.3.0")), 1);
        assert!(pm.paths().contains("/node_modules/left-pad/index.js"));
        assert_eq!(pm.packages(), vec![("left-pad".to_string(), "1.3.0".to_string())]);
    }

    #[test]
    fn test_module_preferred_and_dot_slash_stripped() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package(
            "esm-lib",
            "2.0.0",
            r#""main": "./cjs/index.js", "module": "./esm/index.js""#,
            &["/cjs/index.js", "/esm/index.js"],
        );
        let pm = manager(&fetcher);
        let path = pm.process_path(&deps(&[("esm-lib", "2.0.0")]), "esm-lib").unwrap();
        assert_eq!(path.as_deref(), Some("/node_modules/esm-lib/esm/index.js"));
    }

    #[test]
    fn test_version_pinning() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("react", "18.3.1", r#""main": "index.js""#, &["/index.js"]);
        fetcher.add_package("react", "17.0.2", r#""main": "index.js""#, &["/index.js"]);
        let pm = manager(&fetcher);

        pm.process_path(&deps(&[("react", "18.3.1")]), "react").unwrap();
        let path = pm.process_path(&deps(&[("react", "17.0.2")]), "react").unwrap();
        assert_eq!(path.as_deref(), Some("/node_modules/react/index.js"));

        assert_eq!(pm.package("react").unwrap().version, "18.3.1");
        assert_eq!(fetcher.requests(&registry().manifest("react", "17.0.2", "")), 0);
        assert_eq!(fetcher.requests(&registry().manifest("react", "18.3.1", "")), 1);

        fetcher.add(&registry().package_file("react", "18.3.1", "/index.js"), "module.exports = 18;");
        let cache = Cache::new();
        let bytes = pm.load_file(&cache, "/node_modules/react/index.js").unwrap();
        assert_eq!(bytes.to_text_lossy(), "module.exports = 18;");
        assert_eq!(fetcher.requests(&registry().package_file("react", "18.3.1", "/index.js")), 1);
        assert_eq!(fetcher.requests(&registry().package_file("react", "17.0.2", "/index.js")), 0);
    }

    #[test]
    fn test_concurrent_first_references_share_pinned_version() {
        const N: usize = 8;
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("react", "18.3.1", r#""main": "index.js""#, &["/index.js"]);
        fetcher.add_package("react", "17.0.2", r#""main": "index.js""#, &["/index.js"]);
        let pm = manager(&fetcher);
        let barrier = std::sync::Barrier::new(N);

        let seen: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..N)
                .map(|i| {
                    let (pm, barrier) = (&pm, &barrier);
                    scope.spawn(move || {
                        let version = if i % 2 == 0 { "18.3.1" } else { "17.0.2" };
                        barrier.wait();
                        let path = pm.process_path(&deps(&[("react", version)]), "react").unwrap();
                        assert_eq!(path.as_deref(), Some("/node_modules/react/index.js"));
                        pm.package("react").unwrap().version.clone()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let pinned = pm.package("react").unwrap().version.clone();
        assert!(pinned == "18.3.1" || pinned == "17.0.2");
        assert!(seen.iter().all(|v| *v == pinned), "{seen:?} vs {pinned}");
        assert_eq!(pm.packages(), vec![("react".to_string(), pinned)]);
    }

    #[test]
    fn test_sub_package_manifest_is_lazy() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package(
            "react-dom",
            "18.3.1",
            r#""main": "index.js""#,
            &["/index.js", "/client.js", "/client/package.json", "/client/index.js", "/server/package.json"],
        );
        fetcher.add_json(
            &registry().manifest("react-dom", "18.3.1", "/client"),
            r#"{ "name": "react-dom-client", "version": "18.3.1", "main": "./index.js" }"#,
        );
        let pm = manager(&fetcher);
        let declared = deps(&[("react-dom", "18.3.1")]);

        pm.process_path(&declared, "react-dom").unwrap();
        let meta = pm.package("react-dom").unwrap();
        assert_eq!(meta.sub_packages.len(), 2);
        assert!(!meta.sub_package("/client").unwrap().is_loaded());

        let path = pm.process_path(&declared, "react-dom/client").unwrap();
        assert_eq!(path.as_deref(), Some("/node_modules/react-dom/client/index.js"));
        assert!(meta.sub_package("/client").unwrap().is_loaded());
        assert!(!meta.sub_package("/server").unwrap().is_loaded());

        pm.process_path(&declared, "react-dom/client").unwrap();
        assert_eq!(fetcher.requests(&registry().manifest("react-dom", "18.3.1", "/client")), 1);
    }

    #[test]
    fn test_plain_subpath_is_kept() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("lodash", "4.17.21", r#""main": "lodash.js""#, &["/lodash.js", "/debounce.js"]);
        let pm = manager(&fetcher);
        let path = pm.process_path(&Dependencies::default(), "lodash/debounce").unwrap();
        assert_eq!(path.as_deref(), Some("/node_modules/lodash/debounce"));
    }

    #[test]
    fn test_implied_versions_from_manifest() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package(
            "react",
            "18.3.1",
            r#""main": "index.js", "dependencies": { "loose-envify": "1.4.0" }"#,
            &["/index.js"],
        );
        fetcher.add_package("loose-envify", "1.4.0", r#""main": "index.js""#, &["/index.js"]);
        let pm = manager(&fetcher);

        pm.process_path(&deps(&[("react", "18.3.1")]), "react").unwrap();
        assert_eq!(pm.implied_version("loose-envify").as_deref(), Some("1.4.0"));

        pm.process_path(&Dependencies::default(), "loose-envify").unwrap();
        assert_eq!(fetcher.requests(&registry().manifest("loose-envify", "1.4.0", "")), 1);
        assert_eq!(fetcher.requests(&registry().manifest("loose-envify", "latest", "")), 0);
    }

    #[test]
    fn test_sub_package_manifest_keeps_implied_version() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package(
            "react-dom",
            "18.3.1",
            r#""main": "index.js""#,
            &["/index.js", "/client/package.json", "/client/index.js"],
        );
        fetcher.add_json(
            &registry().manifest("react-dom", "18.3.1", "/client"),
            r#"{ "main": "./index.js" }"#,
        );
        let pm = manager(&fetcher);

        pm.process_path(&Dependencies::default(), "react-dom/client").unwrap();
        assert_eq!(pm.implied_version("react-dom").as_deref(), Some("18.3.1"));
    }

    #[test]
    fn test_missing_entry_point() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("types-only", "1.0.0", r#""types": "index.d.ts""#, &["/index.d.ts"]);
        let pm = manager(&fetcher);
        let err = pm.process_path(&Dependencies::default(), "types-only").unwrap_err();
        assert!(matches!(err, BuildError::MissingEntryPoint { .. }));
    }

    #[test]
    fn test_fetch_failure_is_fatal() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let pm = manager(&fetcher);
        let err = pm.process_path(&Dependencies::default(), "does-not-exist").unwrap_err();
        assert!(err.is_fetch());
        assert!(pm.package("does-not-exist").is_none());
        assert_eq!(fetcher.total_requests(), 1);
    }

    #[test]
    fn test_load_file_cached_by_url() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.add_package("left-pad", "1.3.0", r#""main": "index.js""#, &["/index.js"]);
        let url = registry().package_file("left-pad", "1.3.0", "/index.js");
        fetcher.add(&url, "module.exports = leftPad;");
        let pm = manager(&fetcher);
        let cache = Cache::new();

        pm.process_path(&Dependencies::default(), "left-pad").unwrap();
        let first = pm.load_file(&cache, "/node_modules/left-pad/index.js").unwrap();
        let second = pm.load_file(&cache, "/node_modules/left-pad/index.js").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_text().unwrap(), "module.exports = leftPad;");
        assert_eq!(fetcher.requests(&url), 1);
        assert!(cache.get(&url).is_some());
    }

    #[test]
    fn test_load_file_unknown_package() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let pm = manager(&fetcher);
        let err = pm.load_file(&Cache::new(), "/node_modules/react/index.js").unwrap_err();
        assert!(matches!(err, BuildError::UnknownPackage { name } if name == "react"));

        let err = pm.load_file(&Cache::new(), "/app.tsx").unwrap_err();
        assert!(matches!(err, BuildError::InvalidPackagePath { .. }));
    }
}
