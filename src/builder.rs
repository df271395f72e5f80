//! Build sessions.
//!
//! A [`Builder`] owns one [`BuildContext`] and drives the external
//! [`Compiler`] through it:
//!
//! ```text
//! create_session ─▶ gate: compiler.initialize() once per process
//! build
//!   ├── hooks.before_build (in order)
//!   ├── compiler.build(options, VirtualFsPlugin)
//!   │     ├── resolve: package rewrite | relative join | alias strip, then suffix completion
//!   │     └── load:    hooks ▶ local files ▶ /node_modules/, then hooks.file_loaded
//!   └── diagnostics collected into the context
//! generate_artifact ─▶ preset.generate_html + SHA-256
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut builder = Builder::create_session(
//!     compiler,
//!     SessionOptions::new()
//!         .file("/app.tsx", "export default function App() { return <h1>Hi</h1> }"),
//! )?;
//!
//! let report = builder.build();
//! if report.diagnostics.has_errors() {
//!     eprintln!("{}", report.diagnostics);
//! }
//! let artifact = builder.generate_artifact();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::compiler::{
    BuildOptions, BuildOutput, Compiler, CompilerFailure, LoadArgs, LoadResult, Loader, Message, Plugin, ResolveArgs,
    ResolveResult,
};
use crate::config::{self, RegistryUrls};
use crate::context::{BuildContext, StateValue};
use crate::diagnostic::{BuildError, Diagnostic, Diagnostics, Result, Severity};
use crate::fetch::{Fetcher, default_fetcher};
use crate::file::{VirtualFile, VirtualFiles};
use crate::gate;
use crate::hook::SfcCompiler;
use crate::preset::{Preset, auto_detect};
use crate::resolve::{ALIAS_PREFIX, NODE_MODULES, base_path, join_relative, loader_for, resolve};

/// Progress callback, called with the number of files processed so far.
pub type ProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

// =============================================================================
// Session Options
// =============================================================================

/// Options of [`Builder::create_session`].
#[derive(Default)]
pub struct SessionOptions {
    preset: Option<Arc<dyn Preset>>,
    files: VirtualFiles,
    state: FxHashMap<String, StateValue>,
    progress: Option<ProgressFn>,
    fetcher: Option<Arc<dyn Fetcher>>,
    registry: Option<RegistryUrls>,
    sfc: Option<Arc<dyn SfcCompiler>>,
}

impl SessionOptions {
    /// Default options: preset detected from the files, global config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `preset` instead of detecting one.
    pub fn preset(mut self, preset: impl Preset + 'static) -> Self {
        self.preset = Some(Arc::new(preset));
        self
    }

    /// Use a shared preset.
    pub fn preset_arc(mut self, preset: Arc<dyn Preset>) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Add a source file. Caller files override preset files.
    pub fn file(mut self, path: impl Into<String>, file: impl Into<VirtualFile>) -> Self {
        self.files.insert(path, file);
        self
    }

    /// Add source files.
    pub fn files(mut self, files: VirtualFiles) -> Self {
        self.files.merge(files);
        self
    }

    /// Seed a state value.
    pub fn state(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    /// Report progress.
    pub fn progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Use a custom transport.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use other registry endpoints than the global config.
    pub fn registry(mut self, registry: RegistryUrls) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Compile `.vue` components with `compiler`.
    pub fn sfc_compiler(mut self, compiler: Arc<dyn SfcCompiler>) -> Self {
        self.sfc = Some(compiler);
        self
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Builder::build`].
///
/// Check [`Self::diagnostics`] to decide success; output may be present
/// alongside warnings.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Compiler output, if the compiler returned normally.
    pub output: Option<BuildOutput>,
    /// Errors and warnings of this build.
    pub diagnostics: Diagnostics,
}

impl BuildReport {
    /// Whether the build produced output without errors.
    pub fn is_success(&self) -> bool {
        self.output.is_some() && !self.diagnostics.has_errors()
    }
}

/// The final document and its content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Self-contained HTML document; empty when nothing was built.
    pub html: String,
    /// Hex SHA-256 of `html`; empty when nothing was built.
    pub hash: String,
}

/// Hex-encoded SHA-256 of `text`.
pub fn hash_string(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

// =============================================================================
// Builder
// =============================================================================

/// One build session.
pub struct Builder {
    compiler: Arc<dyn Compiler>,
    context: BuildContext,
    progress: Option<ProgressFn>,
}

impl Builder {
    /// Start a session, initializing the compiler runtime if this process has
    /// not done so yet.
    ///
    /// Only initialization can fail; everything later is reported through
    /// diagnostics.
    pub fn create_session(compiler: Arc<dyn Compiler>, options: SessionOptions) -> Result<Self> {
        let name = compiler.name().to_string();
        gate::ensure_initialized(&name, || {
            log::debug!("initializing compiler {name}");
            compiler.initialize()
        })
        .map_err(|err| BuildError::Compiler(format!("failed to initialize {name}: {err}")))?;

        let SessionOptions {
            preset,
            files,
            state,
            progress,
            fetcher,
            registry,
            sfc,
        } = options;

        let preset = preset.unwrap_or_else(|| {
            let kind = auto_detect(files.paths().iter().map(String::as_str));
            log::debug!("detected preset {kind:?}");
            Arc::new(kind.preset())
        });
        let registry = registry.unwrap_or_else(|| config::get().registry.clone());
        let fetcher = fetcher.unwrap_or_else(default_fetcher);

        let mut context = BuildContext::new(preset, files, state, registry, fetcher);
        context.sfc = sfc;
        Ok(Self {
            compiler,
            context,
            progress,
        })
    }

    /// The session context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Mutable access to the context, to edit files or state between builds.
    pub fn context_mut(&mut self) -> &mut BuildContext {
        &mut self.context
    }

    /// Diagnostics of the last build.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.context.diagnostics
    }

    /// Run the hooks and the compiler.
    ///
    /// Never fails: every error ends up in the returned diagnostics, which
    /// are also kept in the context.
    pub fn build(&mut self) -> BuildReport {
        self.context.diagnostics = Diagnostics::new();
        self.context.output = None;
        self.context.reset_generated();

        let hooks = self.context.hooks.clone();
        if let Err(err) = hooks.before_build(&mut self.context) {
            log::error!("{err}");
            self.context.diagnostics.push(Diagnostic::from(&err));
            return self.report();
        }

        let options = BuildOptions {
            entry_points: self.context.preset.entry_points(),
            inject: self.context.preset.inject(),
            ..BuildOptions::default()
        };

        if options.entry_points.is_empty() {
            self.context.output = Some(BuildOutput::default());
            return self.report();
        }

        let result = {
            let plugin = VirtualFsPlugin::new(&self.context, self.progress.as_ref(), &options.loaders);
            self.compiler.build(&options, &plugin)
        };

        let diagnostics = &mut self.context.diagnostics;
        match result {
            Ok(output) => {
                log_messages(&output.errors, &output.warnings);
                diagnostics.extend_messages(Severity::Error, &output.errors);
                diagnostics.extend_messages(Severity::Warning, &output.warnings);
                self.context.output = Some(output);
            }
            Err(CompilerFailure::Messages { errors, warnings }) => {
                log_messages(&errors, &warnings);
                diagnostics.extend_messages(Severity::Error, &errors);
                diagnostics.extend_messages(Severity::Warning, &warnings);
            }
            Err(CompilerFailure::Other(text)) => {
                log::error!("{text}");
                diagnostics.push(Diagnostic::error(text));
            }
        }

        log::debug!("build finished: {}", self.context.diagnostics.summary());
        self.report()
    }

    /// Assemble the document from the last build's output.
    ///
    /// Returns an empty artifact if no build produced output. Calling it again
    /// without rebuilding yields the same artifact.
    pub fn generate_artifact(&self) -> Artifact {
        let Some(output) = &self.context.output else {
            return Artifact::default();
        };

        let html = self.context.preset.generate_html(&self.context, output);
        let hash = hash_string(&html);
        Artifact { html, hash }
    }

    fn report(&self) -> BuildReport {
        BuildReport {
            output: self.context.output.clone(),
            diagnostics: self.context.diagnostics.clone(),
        }
    }
}

fn log_messages(errors: &[Message], warnings: &[Message]) {
    for error in errors {
        log::error!("{error}");
    }
    for warning in warnings {
        log::warn!("{warning}");
    }
}

// =============================================================================
// Compiler Plugin
// =============================================================================

/// Serves the compiler's resolve and load calls from a [`BuildContext`].
struct VirtualFsPlugin<'a> {
    ctx: &'a BuildContext,
    progress: Option<&'a ProgressFn>,
    loaders: &'a FxHashMap<String, Loader>,
    processed: AtomicUsize,
}

impl<'a> VirtualFsPlugin<'a> {
    fn new(
        ctx: &'a BuildContext,
        progress: Option<&'a ProgressFn>,
        loaders: &'a FxHashMap<String, Loader>,
    ) -> Self {
        if let Some(progress) = progress {
            progress(0);
        }
        Self {
            ctx,
            progress,
            loaders,
            processed: AtomicUsize::new(0),
        }
    }

    fn tick(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(progress) = self.progress {
            progress(processed);
        }
    }

    /// Resolve `path` against local files first, then package files.
    fn complete(&self, path: &str) -> Option<String> {
        let package_paths = self.ctx.packages.paths();
        resolve(path, &[self.ctx.files.paths(), &*package_paths])
    }

    fn load_contents(&self, args: &LoadArgs) -> Result<Option<LoadResult>> {
        let ctx = self.ctx;
        if let Some(result) = ctx.hooks.load_file(ctx, args)? {
            return Ok(Some(result));
        }

        let loader = loader_for(&args.path, self.loaders);
        if let Some(contents) = ctx.contents(&args.path) {
            return Ok(Some(LoadResult::new(contents, loader)));
        }

        if args.path.starts_with(NODE_MODULES) {
            let contents = ctx.packages.load_file(&ctx.cache, &args.path)?;
            return Ok(Some(LoadResult::new(contents, loader)));
        }

        Ok(None)
    }
}

impl Plugin for VirtualFsPlugin<'_> {
    fn name(&self) -> &str {
        "virtual-file-system"
    }

    fn resolve(&self, args: &ResolveArgs) -> std::result::Result<Option<ResolveResult>, Message> {
        if args.path.starts_with("data:") {
            return Ok(None);
        }

        let importer = self.complete(&args.importer).unwrap_or_else(|| args.importer.clone());
        let base = base_path(&importer);

        let spec = args.path.as_str();
        let path = match self.ctx.packages.process_path(&self.ctx.dependencies, spec)? {
            Some(path) => path,
            None if spec.starts_with("./") || spec.starts_with("../") => join_relative(base, spec),
            None if spec.starts_with(ALIAS_PREFIX) => spec[1..].to_string(),
            None => spec.to_string(),
        };

        let path = match self.complete(&path) {
            Some(found) => found,
            None => path,
        };

        log::debug!("resolve: {spec} ({}) -> {path}", args.importer);
        self.tick();

        Ok(Some(ResolveResult {
            path,
            plugin_data: args.plugin_data.clone(),
        }))
    }

    fn load(&self, args: &LoadArgs) -> std::result::Result<Option<LoadResult>, Message> {
        let Some(mut result) = self.load_contents(args)? else {
            return Ok(None);
        };

        self.ctx.hooks.file_loaded(self.ctx, args, &mut result)?;
        log::debug!("load: {} ({})", args.path, result.loader);
        self.tick();

        Ok(Some(result))
    }
}
