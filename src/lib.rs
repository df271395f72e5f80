//! # virtual-bundler
//!
//! Module resolution, registry package fetching and a hook pipeline for
//! bundling in-memory sources into a self-contained HTML document.
//!
//! Sources live in a virtual file set (`/app.tsx`, `/main.css`, ...). Bare
//! imports such as `react` are resolved lazily against a registry CDN into a
//! synthetic `/node_modules/` namespace; package files are downloaded only
//! when the compiler loads them and cached per session by URL.
//!
//! The parser/transformer/minifier itself is an external [`Compiler`]; this
//! crate answers its resolve and load calls:
//!
//! - **Resolver**: exact match, then suffix completion (`.ts`, `/index.tsx`, ...)
//! - **Packages**: manifest and file listing fetched on first reference,
//!   version pinned for the session
//! - **Hooks**: preset extensions that add files before the build, serve
//!   paths, and rewrite loaded files
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use virtual_bundler::{Builder, SessionOptions};
//!
//! let mut builder = Builder::create_session(
//!     Arc::new(my_compiler),
//!     SessionOptions::new()
//!         .file("/app.tsx", "export default function App() { return <h1>Hello</h1> }"),
//! )?;
//!
//! let report = builder.build();
//! if report.diagnostics.has_errors() {
//!     eprintln!("{}", report.diagnostics);
//! }
//!
//! let artifact = builder.generate_artifact();
//! println!("{} ({})", artifact.html, artifact.hash);
//! ```
//!
//! ## Modules
//!
//! - [`builder`]: sessions, build orchestration, artifacts
//! - [`compiler`]: the external compiler contract
//! - [`resolve`]: path resolution helpers
//! - [`package`]: registry packages
//! - [`hook`]: hook pipeline and built-in hooks
//! - [`preset`]: framework presets
//! - [`gate`]: process-wide one-shot initialization
//! - [`config`]: runtime configuration (User-Agent, registry, timeouts)
//! - [`diagnostic`]: errors and diagnostic formatting

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fetch;
pub mod file;
pub mod gate;
pub mod hook;
pub mod package;
pub mod preset;
pub mod resolve;

#[cfg(feature = "batch")]
pub mod batch;

#[cfg(test)]
mod testing;

// =============================================================================
// Sessions
// =============================================================================

pub use builder::{Artifact, BuildReport, Builder, ProgressFn, SessionOptions, hash_string};
pub use context::{BuildContext, StateValue};
pub use file::{VirtualFile, VirtualFiles};
pub use preset::{Preset, PresetKind, StandardPreset, auto_detect};

#[cfg(feature = "batch")]
pub use batch::{build_all, generate_all};

// =============================================================================
// Compiler Contract
// =============================================================================

pub use compiler::{
    BuildOptions, BuildOutput, Compiler, CompilerFailure, LoadArgs, LoadResult, Loader, Location, Message,
    OutputFile, Plugin, ResolveArgs, ResolveResult,
};

// =============================================================================
// Diagnostics
// =============================================================================

pub use diagnostic::{
    // Error type
    BuildError,
    // Structured data
    Diagnostic, DiagnosticSummary, Diagnostics, Severity,
    // Formatting and filtering
    DiagnosticFilter, DiagnosticOptions, DisplayStyle, FilterType,
};

// =============================================================================
// Infrastructure
// =============================================================================

pub use cache::{Bytes, Cache};
pub use config::{Config, ConfigBuilder, RegistryUrls};
pub use fetch::{FetchError, Fetcher};
pub use hook::{Capabilities, ComponentRegistryHook, Hook, HookPipeline, SfcCompiler, VueSfcHook};
pub use package::PackageManager;

#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
