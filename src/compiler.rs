//! Contract of the external bundler.
//!
//! The actual parser/transformer/minifier is a black box. This module only
//! describes how it is driven: a one-time [`Compiler::initialize`], a
//! [`Compiler::build`] call with [`BuildOptions`], and the two extension
//! points a [`Plugin`] answers while the compiler walks the module graph.
//!
//! ```text
//! Compiler::build(options, plugin)
//!   ├── plugin.resolve(specifier, importer) -> path
//!   ├── plugin.load(path)                   -> contents + loader
//!   └── ... until the graph is closed
//!   => BuildOutput { output_files, errors, warnings }
//! ```

use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::cache::Bytes;

// =============================================================================
// Loader
// =============================================================================

/// How the compiler should interpret loaded contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loader {
    /// Plain JavaScript.
    Js,
    /// JavaScript with JSX.
    Jsx,
    /// TypeScript.
    Ts,
    /// TypeScript with JSX.
    Tsx,
    /// Stylesheet.
    Css,
    /// JSON module.
    Json,
    /// Binary asset embedded as a `data:` URL.
    DataUrl,
}

impl Loader {
    /// Lowercase name as used by bundler configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Jsx => "jsx",
            Self::Ts => "ts",
            Self::Tsx => "tsx",
            Self::Css => "css",
            Self::Json => "json",
            Self::DataUrl => "dataurl",
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Source position attached to a compiler message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Virtual path of the file.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    /// The offending source line, if known.
    pub line_text: Option<String>,
}

/// An error or warning exchanged with the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Message text.
    pub text: String,
    /// Where it happened, if known.
    pub location: Option<Location>,
}

impl Message {
    /// A message without location.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
        }
    }

    /// Attach a location.
    pub fn at(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
            column,
            line_text: None,
        });
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "[{}:{}:{}] {}", loc.file, loc.line, loc.column, self.text),
            None => f.write_str(&self.text),
        }
    }
}

impl From<crate::diagnostic::BuildError> for Message {
    fn from(err: crate::diagnostic::BuildError) -> Self {
        Self::new(err.to_string())
    }
}

// =============================================================================
// Plugin Extension Points
// =============================================================================

/// Arguments of a resolve callback.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    /// The specifier as written in the import statement.
    pub path: String,
    /// Resolved path of the importing module; empty for entry points.
    pub importer: String,
    /// Data attached to the importer by a previous load.
    pub plugin_data: Option<JsonValue>,
}

/// Answer of a resolve callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveResult {
    /// Canonical virtual path.
    pub path: String,
    /// Data handed to the matching load call.
    pub plugin_data: Option<JsonValue>,
}

/// Arguments of a load callback.
#[derive(Debug, Clone, Default)]
pub struct LoadArgs {
    /// Canonical virtual path, possibly with a `?query`.
    pub path: String,
    /// Data attached by the resolve step.
    pub plugin_data: Option<JsonValue>,
}

impl LoadArgs {
    /// Load arguments for a plain path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            plugin_data: None,
        }
    }
}

/// Answer of a load callback.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    /// File contents.
    pub contents: Bytes,
    /// How to interpret them.
    pub loader: Loader,
    /// Data passed on to resolves of imports inside this file.
    pub plugin_data: Option<JsonValue>,
    /// Errors to report for this file.
    pub errors: Vec<Message>,
    /// Warnings to report for this file.
    pub warnings: Vec<Message>,
}

impl LoadResult {
    /// A successful load.
    pub fn new(contents: impl Into<Bytes>, loader: Loader) -> Self {
        Self {
            contents: contents.into(),
            loader,
            plugin_data: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// The resolve/load extension contract consumed by the compiler.
///
/// Both callbacks may be invoked concurrently for independent paths.
/// `Ok(None)` means "not mine", leaving the compiler to its defaults.
pub trait Plugin: Send + Sync {
    /// Name used in compiler diagnostics.
    fn name(&self) -> &str;

    /// Map a specifier to a canonical path.
    fn resolve(&self, args: &ResolveArgs) -> Result<Option<ResolveResult>, Message>;

    /// Produce the contents of a canonical path.
    fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>, Message>;
}

// =============================================================================
// Build
// =============================================================================

/// Options for one compiler invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Modules the graph starts from.
    pub entry_points: Vec<String>,
    /// Modules implicitly imported by every module.
    pub inject: Vec<String>,
    /// Bundle all imports into one output.
    pub bundle: bool,
    /// Minify output.
    pub minify: bool,
    /// Language level of the output.
    pub target: String,
    /// Runtime platform.
    pub platform: String,
    /// Name of the output script.
    pub outfile: String,
    /// JSX factory function.
    pub jsx_factory: String,
    /// JSX fragment.
    pub jsx_fragment: String,
    /// Compile-time substitutions.
    pub define: FxHashMap<String, String>,
    /// Loader overrides by file extension (including the dot).
    pub loaders: FxHashMap<String, Loader>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let define = [("process.env.NODE_ENV".to_string(), "\"production\"".to_string())]
            .into_iter()
            .collect();
        let loaders = [".svg", ".jpg", ".jpeg", ".png", ".woff"]
            .into_iter()
            .map(|ext| (ext.to_string(), Loader::DataUrl))
            .collect();

        Self {
            entry_points: Vec::new(),
            inject: Vec::new(),
            bundle: true,
            minify: true,
            target: "es2020".to_string(),
            platform: "browser".to_string(),
            outfile: "bundle.js".to_string(),
            jsx_factory: "React.createElement".to_string(),
            jsx_fragment: "React.Fragment".to_string(),
            define,
            loaders,
        }
    }
}

/// A file emitted by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Output path, e.g. `bundle.js` or `bundle.css`.
    pub path: String,
    /// Emitted bytes.
    pub contents: Bytes,
}

impl OutputFile {
    /// Create an output file.
    pub fn new(path: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Contents as text.
    pub fn text(&self) -> String {
        self.contents.to_text_lossy()
    }
}

/// Result of a compiler run that returned normally.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Emitted files.
    pub output_files: Vec<OutputFile>,
    /// Errors reported alongside the output.
    pub errors: Vec<Message>,
    /// Warnings reported alongside the output.
    pub warnings: Vec<Message>,
}

/// A compiler run that raised before producing output.
#[derive(Debug, Clone, Error)]
pub enum CompilerFailure {
    /// The compiler reported structured messages.
    #[error("build failed with {} error(s)", .errors.len())]
    Messages {
        /// Errors.
        errors: Vec<Message>,
        /// Warnings.
        warnings: Vec<Message>,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// The external bundler.
pub trait Compiler: Send + Sync {
    /// Key of the process-wide initialization gate for this compiler.
    fn name(&self) -> &str;

    /// Expensive runtime setup. Called at most once per process per
    /// [`Compiler::name`], guarded by [`crate::gate`].
    fn initialize(&self) -> Result<(), CompilerFailure> {
        Ok(())
    }

    /// Run a build, calling back into `plugin` for every resolve and load.
    fn build(
        &self,
        options: &BuildOptions,
        plugin: &dyn Plugin,
    ) -> Result<BuildOutput, CompilerFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display() {
        assert_eq!(Message::new("boom").to_string(), "boom");
        assert_eq!(
            Message::new("Could not resolve \"x\"").at("/app.tsx", 3, 7).to_string(),
            "[/app.tsx:3:7] Could not resolve \"x\""
        );
    }

    #[test]
    fn test_default_build_options() {
        let options = BuildOptions::default();
        assert!(options.bundle && options.minify);
        assert_eq!(options.target, "es2020");
        assert_eq!(options.loaders.get(".png"), Some(&Loader::DataUrl));
        assert_eq!(
            options.define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"production\"")
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = CompilerFailure::Messages {
            errors: vec![Message::new("a"), Message::new("b")],
            warnings: vec![],
        };
        assert_eq!(failure.to_string(), "build failed with 2 error(s)");
    }
}
