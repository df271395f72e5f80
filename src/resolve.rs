//! Module resolution over virtual path sets.
//!
//! Everything here is pure string manipulation on rooted, `/`-separated
//! virtual paths. Nothing touches the real filesystem.
//!
//! # Resolution
//!
//! ```text
//! resolve("/a", [local, packages])
//!   local:    "/a"? "/a.ts"? "/a.tsx"? ... "/a/index.d.ts"?
//!   packages: "/a"? "/a.ts"? ...
//! ```
//!
//! The first hit wins, scanning sets in the order given and suffixes in
//! [`DEFAULT_SUFFIXES`] order.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiler::Loader;

/// Prefix of the synthetic namespace package files are registered under.
pub const NODE_MODULES: &str = "/node_modules/";

/// Prefix of root-alias specifiers (`@/components/x` means `/components/x`).
pub const ALIAS_PREFIX: &str = "@/";

/// Suffixes tried, in order, when a path does not match verbatim.
pub const DEFAULT_SUFFIXES: [&str; 12] = [
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".mjs",
    ".d.ts",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/index.mjs",
    "/index.jsx",
    "/index.d.ts",
];

/// Resolve `path` against candidate path sets.
///
/// Returns `None` when nothing matches; callers keep the unresolved path.
pub fn resolve(path: &str, sets: &[&FxHashSet<String>]) -> Option<String> {
    for paths in sets {
        if paths.contains(path) {
            return Some(path.to_string());
        }

        let stripped = strip_end("/", path);
        for suffix in DEFAULT_SUFFIXES {
            let current = format!("{stripped}{suffix}");
            if paths.contains(&current) {
                return Some(current);
            }
        }
    }

    None
}

/// Remove `prefix` from the start of `s` if present.
pub fn strip_start<'a>(prefix: &str, s: &'a str) -> &'a str {
    if prefix.is_empty() {
        return s;
    }
    s.strip_prefix(prefix).unwrap_or(s)
}

/// Remove `suffix` from the end of `s` if present.
pub fn strip_end<'a>(suffix: &str, s: &'a str) -> &'a str {
    if suffix.is_empty() {
        return s;
    }
    s.strip_suffix(suffix).unwrap_or(s)
}

/// Whether `spec` names a registry package rather than a file.
pub fn is_package_path(spec: &str) -> bool {
    !(spec.starts_with("./")
        || spec.starts_with("../")
        || spec.starts_with('/')
        || spec.starts_with(ALIAS_PREFIX))
}

/// A bare specifier split into package name and path within the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    /// Package name, including the scope for scoped packages.
    pub name: String,
    /// Path inside the package; empty or starting with `/`.
    pub path: String,
}

/// Split a bare specifier (or a `/node_modules/...` path) into name and path.
///
/// ```
/// use virtual_bundler::resolve::split_package;
///
/// let pkg = split_package("/node_modules/lodash/debounce").unwrap();
/// assert_eq!((pkg.name.as_str(), pkg.path.as_str()), ("lodash", "/debounce"));
///
/// let pkg = split_package("@scope/pkg/sub").unwrap();
/// assert_eq!((pkg.name.as_str(), pkg.path.as_str()), ("@scope/pkg", "/sub"));
///
/// assert!(split_package("./x").is_none());
/// assert!(split_package("@/x").is_none());
/// ```
pub fn split_package(spec: &str) -> Option<PackageRef> {
    let spec = strip_start(NODE_MODULES, spec);
    if !is_package_path(spec) || spec.is_empty() {
        return None;
    }

    let mut parts = spec.split('/');
    let mut name = parts.next()?.to_string();
    if name.starts_with('@') {
        let inner = parts.next().unwrap_or_default();
        name = format!("{name}/{inner}");
    }

    let rest: Vec<&str> = parts.collect();
    let path = if rest.is_empty() {
        String::new()
    } else {
        format!("/{}", rest.join("/"))
    };

    Some(PackageRef { name, path })
}

/// Directory part of `path`, treating extensionless last segments as
/// directories.
///
/// `/a/b.ts` → `/a`, `/a/b` → `/a/b`, `b.ts` → ``.
pub fn base_path(path: &str) -> &str {
    let last_slash = path.rfind('/');
    let last_dot = path.rfind('.');

    match (last_dot, last_slash) {
        (None, _) => path,
        (Some(dot), Some(slash)) if dot < slash => path,
        (Some(_), Some(slash)) => &path[..slash],
        (Some(_), None) => "",
    }
}

/// Split `path` at its last `/` into `(base, file_name)`.
pub fn file_name(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

/// Join a relative specifier onto a base directory, URL style.
///
/// `.` segments are dropped and `..` pops a segment but never escapes the
/// root; a trailing `/` on the specifier is kept.
pub fn join_relative(base_dir: &str, spec: &str) -> String {
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    let trailing_slash = spec.ends_with('/');
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut joined = format!("/{}", segments.join("/"));
    if trailing_slash && joined.len() > 1 {
        joined.push('/');
    }
    joined
}

/// Pick the compiler loader for a file by extension.
///
/// `overrides` (keyed by extension, dot included) wins over the built-in
/// table. Single-file components are pre-transformed by a hook into script,
/// so they share the typed-script loader.
pub fn loader_for(path: &str, overrides: &FxHashMap<String, Loader>) -> Loader {
    let path = path.to_ascii_lowercase();

    if let Some(loader) = extension(&path).and_then(|ext| overrides.get(ext)) {
        *loader
    } else if path.ends_with(".ts") || path.ends_with(".vue") {
        Loader::Ts
    } else if path.ends_with(".tsx") {
        Loader::Tsx
    } else if path.ends_with(".js") || path.ends_with(".mjs") || path.ends_with(".cjs") {
        Loader::Js
    } else if path.ends_with(".jsx") {
        Loader::Jsx
    } else if path.ends_with(".json") {
        Loader::Json
    } else if path.ends_with(".css") || path.ends_with(".scss") {
        Loader::Css
    } else {
        Loader::Tsx
    }
}

/// Extension of the last path segment, dot included.
fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map(|dot| &name[dot..])
}
