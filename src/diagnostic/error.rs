//! Session error type.

use thiserror::Error;

use crate::fetch::FetchError;

/// Result alias used throughout the crate.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Everything that can go wrong while resolving or loading a module.
///
/// None of these escape [`crate::Builder::build`]: they are surfaced to the
/// compiler as load/resolve errors, or caught at the top of the build and
/// recorded as [`super::Diagnostic`]s.
///
/// # Example
///
/// ```ignore
/// match packages.process_path(&deps, "left-pad") {
///     Ok(Some(path)) => println!("resolved to {path}"),
///     Ok(None) => println!("not a package"),
///     Err(BuildError::Fetch(e)) => eprintln!("registry unavailable: {e}"),
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum BuildError {
    /// A manifest, listing or file could not be fetched.
    #[error("failed to fetch: {0}")]
    Fetch(#[from] FetchError),

    /// A package or sub-package manifest has no usable entry-point field.
    #[error("no `module`, `main` or `umd:main` entry in {package}{path}/package.json")]
    MissingEntryPoint {
        /// Package name.
        package: String,
        /// Sub-package path; empty for the package root.
        path: String,
    },

    /// A sub-package was referenced before its manifest was loaded.
    #[error("manifest not loaded for {package}{path}")]
    MissingManifest {
        /// Package name.
        package: String,
        /// Sub-package path.
        path: String,
    },

    /// A package file was requested for a package never resolved.
    #[error("package \"{name}\" not found")]
    UnknownPackage {
        /// Package name.
        name: String,
    },

    /// A `/node_modules/` path that does not name a package.
    #[error("invalid package path \"{path}\"")]
    InvalidPackagePath {
        /// The offending path.
        path: String,
    },

    /// A registry document was not valid JSON of the expected shape.
    #[error("invalid registry response from {url}: {source}")]
    Manifest {
        /// Requested URL.
        url: String,
        /// Parse error.
        source: serde_json::Error,
    },

    /// A hook failed.
    #[error("hook `{hook}` failed: {message}")]
    Hook {
        /// Hook name.
        hook: String,
        /// Failure description.
        message: String,
    },

    /// The compiler raised without a structured message list.
    #[error("{0}")]
    Compiler(String),
}

impl BuildError {
    /// Create a hook error.
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the network.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
