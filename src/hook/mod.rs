//! Hook pipeline.
//!
//! Presets extend a build through [`Hook`]s. A hook declares which of the
//! three callbacks it implements; the pipeline only dispatches those.
//!
//! | Callback       | When                                | Order                      |
//! |----------------|-------------------------------------|----------------------------|
//! | `before_build` | before the compiler starts          | every hook, in order       |
//! | `load_file`    | for every path the compiler loads   | first `Some` wins          |
//! | `file_loaded`  | after any source produced a file    | every hook, in order       |
//!
//! `file_loaded` runs for content from any source (hooks, local files,
//! packages), so a later hook can rewrite what an earlier one produced.

pub mod registry;
pub mod sfc;

use std::fmt;
use std::sync::Arc;

use crate::compiler::{LoadArgs, LoadResult};
use crate::context::BuildContext;
use crate::diagnostic::Result;

pub use registry::{ComponentRegistryHook, ComponentRegistryOptions};
pub use sfc::{SfcCompiler, VueSfcHook};

/// Callbacks a hook implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Runs [`Hook::before_build`].
    pub before_build: bool,
    /// Runs [`Hook::load_file`].
    pub load_file: bool,
    /// Runs [`Hook::file_loaded`].
    pub file_loaded: bool,
}

impl Capabilities {
    /// No callbacks.
    pub const NONE: Self = Self {
        before_build: false,
        load_file: false,
        file_loaded: false,
    };

    /// Every callback.
    pub const ALL: Self = Self {
        before_build: true,
        load_file: true,
        file_loaded: true,
    };

    /// Enable `before_build`.
    pub const fn with_before_build(mut self) -> Self {
        self.before_build = true;
        self
    }

    /// Enable `load_file`.
    pub const fn with_load_file(mut self) -> Self {
        self.load_file = true;
        self
    }

    /// Enable `file_loaded`.
    pub const fn with_file_loaded(mut self) -> Self {
        self.file_loaded = true;
        self
    }
}

/// A build extension supplied by a preset.
///
/// Every callback defaults to a no-op; [`Hook::capabilities`] must name the
/// ones the hook overrides.
///
/// ```
/// use virtual_bundler::compiler::{LoadArgs, LoadResult, Loader};
/// use virtual_bundler::context::BuildContext;
/// use virtual_bundler::diagnostic::Result;
/// use virtual_bundler::hook::{Capabilities, Hook};
///
/// struct Banner;
///
/// impl Hook for Banner {
///     fn name(&self) -> &str {
///         "banner"
///     }
///
///     fn capabilities(&self) -> Capabilities {
///         Capabilities::NONE.with_file_loaded()
///     }
///
///     fn file_loaded(&self, _: &BuildContext, args: &LoadArgs, result: &mut LoadResult) -> Result<()> {
///         if result.loader == Loader::Tsx {
///             let text = format!("/* {} */\n{}", args.path, result.contents.to_text_lossy());
///             result.contents = text.into();
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Hook: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Callbacks this hook implements.
    fn capabilities(&self) -> Capabilities;

    /// Prepare the context before compiling: add files, includes, state.
    fn before_build(&self, _ctx: &mut BuildContext) -> Result<()> {
        Ok(())
    }

    /// Supply the contents of a path, or `None` to pass.
    fn load_file(&self, _ctx: &BuildContext, _args: &LoadArgs) -> Result<Option<LoadResult>> {
        Ok(None)
    }

    /// Inspect or rewrite a loaded file.
    fn file_loaded(&self, _ctx: &BuildContext, _args: &LoadArgs, _result: &mut LoadResult) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// HookPipeline
// =============================================================================

/// Ordered list of hooks.
///
/// Cloning is cheap; hooks are shared.
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookPipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook.
    pub fn push(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Append a shared hook.
    pub fn push_arc(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Append a hook, builder style.
    pub fn with(mut self, hook: impl Hook + 'static) -> Self {
        self.push(hook);
        self
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    /// Run every `before_build`, stopping at the first failure.
    pub fn before_build(&self, ctx: &mut BuildContext) -> Result<()> {
        for hook in self.with_capability(|caps| caps.before_build) {
            log::debug!("hook {}: before_build", hook.name());
            hook.before_build(ctx)?;
        }
        Ok(())
    }

    /// Ask each hook for `args.path`; the first `Some` wins.
    pub fn load_file(&self, ctx: &BuildContext, args: &LoadArgs) -> Result<Option<LoadResult>> {
        for hook in self.with_capability(|caps| caps.load_file) {
            if let Some(result) = hook.load_file(ctx, args)? {
                log::debug!("hook {}: loaded {}", hook.name(), args.path);
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Run every `file_loaded` on `result`, in order.
    pub fn file_loaded(&self, ctx: &BuildContext, args: &LoadArgs, result: &mut LoadResult) -> Result<()> {
        for hook in self.with_capability(|caps| caps.file_loaded) {
            hook.file_loaded(ctx, args, result)?;
        }
        Ok(())
    }

    fn with_capability(&self, has: impl Fn(Capabilities) -> bool) -> impl Iterator<Item = &Arc<dyn Hook>> {
        self.hooks.iter().filter(move |hook| has(hook.capabilities()))
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FromIterator<Arc<dyn Hook>> for HookPipeline {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Hook>>>(iter: I) -> Self {
        Self {
            hooks: iter.into_iter().collect(),
        }
    }
}
