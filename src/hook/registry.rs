//! UI components fetched from a git-hosted component registry.
//!
//! Sources importing `@/components/ui/<name>` get the component's source
//! straight from the registry repository instead of a local copy, together
//! with the shared helpers under `@/lib/` and a theme stylesheet.

use crate::compiler::{LoadArgs, LoadResult, Loader};
use crate::context::BuildContext;
use crate::diagnostic::Result;
use crate::resolve::strip_start;

use super::{Capabilities, Hook};

/// State flag set when any source uses registry components.
pub const ENABLED_KEY: &str = "shadcn/enabled";
/// State key overriding the configured theme.
pub const THEME_KEY: &str = "shadcn/theme";
/// Path of the injected theme stylesheet.
pub const STYLESHEET_PATH: &str = "/globals.css";

const COMPONENTS_PREFIX: &str = "/components/ui/";
const LIB_PREFIX: &str = "/lib/";
const ORG: &str = "shadcn-ui";
const REPO: &str = "ui";

/// Options of [`ComponentRegistryHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRegistryOptions {
    /// Registry theme (`default`, `new-york`).
    pub theme: String,
    /// Registry release, or `latest` for the main branch.
    pub version: String,
}

impl Default for ComponentRegistryOptions {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            version: "latest".to_string(),
        }
    }
}

/// Serves `/components/ui/*`, `/registry/{theme}/ui/*` and `/lib/*` from the
/// component registry.
#[derive(Debug, Clone)]
pub struct ComponentRegistryHook {
    theme: String,
    git_ref: String,
}

impl Default for ComponentRegistryHook {
    fn default() -> Self {
        Self::new(ComponentRegistryOptions::default())
    }
}

impl ComponentRegistryHook {
    /// Create the hook. `latest` maps to the `master` branch, anything else to
    /// the `shadcn-ui@{version}` release tag.
    pub fn new(options: ComponentRegistryOptions) -> Self {
        let git_ref = match options.version.as_str() {
            "latest" => "master".to_string(),
            version => format!("shadcn-ui@{version}"),
        };
        Self {
            theme: options.theme,
            git_ref,
        }
    }

    /// Git ref the sources are fetched from.
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    fn theme<'a>(&'a self, ctx: &'a BuildContext) -> &'a str {
        ctx.text(THEME_KEY).unwrap_or(self.theme.as_str())
    }

    fn fetch(&self, ctx: &BuildContext, path: &str, loader: Loader) -> Result<Option<LoadResult>> {
        let url = ctx.registry.repository_file(ORG, REPO, &self.git_ref, path);
        let contents = ctx.fetch_cached(&url)?;
        Ok(Some(LoadResult::new(contents, loader)))
    }
}

impl Hook for ComponentRegistryHook {
    fn name(&self) -> &str {
        "component-registry"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_before_build().with_load_file()
    }

    fn before_build(&self, ctx: &mut BuildContext) -> Result<()> {
        let enabled = ctx.files.iter().any(|(path, file)| {
            (path.ends_with(".tsx") || path.ends_with(".jsx"))
                && file
                    .as_static()
                    .is_some_and(|data| data.to_text_lossy().contains(COMPONENTS_PREFIX))
        });

        ctx.set_state(ENABLED_KEY, enabled);
        if enabled {
            log::debug!("component registry enabled ({})", self.git_ref);
            ctx.add_file(STYLESHEET_PATH, GLOBALS_CSS);
            ctx.add_include(STYLESHEET_PATH);
        }
        Ok(())
    }

    fn load_file(&self, ctx: &BuildContext, args: &LoadArgs) -> Result<Option<LoadResult>> {
        if !ctx.flag(ENABLED_KEY) {
            return Ok(None);
        }

        let theme = self.theme(ctx);
        let registry_prefix = format!("/registry/{theme}/ui/");
        let path = args.path.as_str();

        if path.starts_with(COMPONENTS_PREFIX) || path.starts_with(&registry_prefix) {
            let name = strip_start(&registry_prefix, strip_start(COMPONENTS_PREFIX, path));
            let name = name.trim_end_matches(".tsx");
            let file = format!("apps/www/registry/{theme}/ui/{name}.tsx");
            self.fetch(ctx, &file, Loader::Tsx)
        } else if let Some(name) = path.strip_prefix(LIB_PREFIX) {
            let name = name.trim_end_matches(".ts");
            self.fetch(ctx, &format!("apps/www/lib/{name}.ts"), Loader::Ts)
        } else {
            Ok(None)
        }
    }
}

/// Theme variables and base layer for registry components.
const GLOBALS_CSS: &str = r#"
@layer base {
:root {
  --background: 0 0% 100%;
  --foreground: 222.2 47.4% 11.2%;

  --muted: 210 40% 96.1%;
  --muted-foreground: 215.4 16.3% 46.9%;

  --popover: 0 0% 100%;
  --popover-foreground: 222.2 47.4% 11.2%;

  --border: 214.3 31.8% 91.4%;
  --input: 214.3 31.8% 91.4%;

  --card: 0 0% 100%;
  --card-foreground: 222.2 47.4% 11.2%;

  --primary: 222.2 47.4% 11.2%;
  --primary-foreground: 210 40% 98%;

  --secondary: 210 40% 96.1%;
  --secondary-foreground: 222.2 47.4% 11.2%;

  --accent: 210 40% 96.1%;
  --accent-foreground: 222.2 47.4% 11.2%;

  --destructive: 0 100% 50%;
  --destructive-foreground: 210 40% 98%;

  --ring: 215 20.2% 65.1%;

  --radius: 0.5rem;
}

.dark {
  --background: 224 71% 4%;
  --foreground: 213 31% 91%;

  --muted: 223 47% 11%;
  --muted-foreground: 215.4 16.3% 56.9%;

  --accent: 216 34% 17%;
  --accent-foreground: 210 40% 98%;

  --popover: 224 71% 4%;
  --popover-foreground: 215 20.2% 65.1%;

  --border: 216 34% 17%;
  --input: 216 34% 17%;

  --card: 224 71% 4%;
  --card-foreground: 213 31% 91%;

  --primary: 210 40% 98%;
  --primary-foreground: 222.2 47.4% 1.2%;

  --secondary: 222.2 47.4% 11.2%;
  --secondary-foreground: 210 40% 98%;

  --destructive: 0 63% 31%;
  --destructive-foreground: 210 40% 98%;

  --ring: 216 34% 17%;

  --radius: 0.5rem;
}
}

@layer base {
  * {
    @apply border-border;
  }
  body {
    @apply bg-background text-foreground;
    font-feature-settings: "rlig" 1, "calt" 1;
  }
}
"#;
