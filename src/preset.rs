//! Framework presets.
//!
//! A preset supplies what a framework needs around the caller's sources:
//! entry points, injected modules, pinned dependencies, helper files, hooks,
//! and the HTML shell the compiled output is inlined into.

use rustc_hash::FxHashMap;

use crate::compiler::BuildOutput;
use crate::context::BuildContext;
use crate::file::{VirtualFile, VirtualFiles};
use crate::hook::{ComponentRegistryHook, ComponentRegistryOptions, Hook, HookPipeline, VueSfcHook};
use crate::package::Dependencies;

/// Build configuration of a framework.
pub trait Preset: Send + Sync {
    /// Preset name.
    fn name(&self) -> &str;

    /// Modules the compiler starts from. An empty list skips compilation.
    fn entry_points(&self) -> Vec<String>;

    /// Modules implicitly imported by every module.
    fn inject(&self) -> Vec<String> {
        Vec::new()
    }

    /// Pinned dependency versions.
    fn dependencies(&self) -> Dependencies {
        Dependencies::default()
    }

    /// Files underneath the caller's files.
    fn files(&self) -> VirtualFiles {
        VirtualFiles::new()
    }

    /// Hooks of a new session.
    fn hooks(&self) -> HookPipeline {
        HookPipeline::new()
    }

    /// Assemble the final document from the compiler output.
    fn generate_html(&self, ctx: &BuildContext, output: &BuildOutput) -> String;
}

// =============================================================================
// Detection
// =============================================================================

/// The built-in presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    /// Plain HTML; nothing is compiled.
    Html,
    /// React with JSX/TSX sources.
    React,
    /// Vue with single-file components.
    Vue,
}

impl PresetKind {
    /// The preset for this kind.
    pub fn preset(self) -> StandardPreset {
        match self {
            Self::Html => StandardPreset::html(),
            Self::React => StandardPreset::react(),
            Self::Vue => StandardPreset::vue(),
        }
    }
}

/// Pick a preset from the source file names: any `.jsx`/`.tsx` selects
/// React, else any `.vue` selects Vue, else HTML.
pub fn auto_detect<'a>(paths: impl IntoIterator<Item = &'a str>) -> PresetKind {
    let mut kind = PresetKind::Html;
    for path in paths {
        if path.ends_with(".jsx") || path.ends_with(".tsx") {
            return PresetKind::React;
        }
        if path.ends_with(".vue") {
            kind = PresetKind::Vue;
        }
    }
    kind
}

// =============================================================================
// StandardPreset
// =============================================================================

const TAILWIND_CDN: &str =
    "https://cdn.tailwindcss.com?plugins=forms,typography,aspect-ratio,container-queries";
const REACT_VERSION: &str = "18.3.1";
const VUE_VERSION: &str = "3.4.38";
const ENTITIES_VERSION: &str = "4.5.0";
const DEFAULT_VUE_APP: &str = "<template><div><h1>The application is empty.</h1></div></template>";
const REGISTRY_VERSION: &str = "0.8.0";

/// A data-driven [`Preset`].
///
/// The generated document inlines every `.js` output as a `<script>` at the
/// end of the body and every `.css` output as a `<style>` in the head, under a
/// single mount element.
///
/// ```
/// use virtual_bundler::preset::{Preset, StandardPreset};
///
/// let preset = StandardPreset::new("widgets")
///     .with_entry_point("/index.ts")
///     .with_dependency("left-pad", "1.3.0")
///     .with_mount_id("app");
/// assert_eq!(preset.entry_points(), vec!["/index.ts"]);
/// ```
#[derive(Clone)]
pub struct StandardPreset {
    name: String,
    entry_points: Vec<String>,
    inject: Vec<String>,
    dependencies: Dependencies,
    files: VirtualFiles,
    hooks: HookPipeline,
    mount_id: String,
    head_scripts: Vec<String>,
    head_stylesheets: Vec<String>,
}

impl StandardPreset {
    /// An empty preset mounting on `#root`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_points: Vec::new(),
            inject: Vec::new(),
            dependencies: FxHashMap::default(),
            files: VirtualFiles::new(),
            hooks: HookPipeline::new(),
            mount_id: "root".to_string(),
            head_scripts: Vec::new(),
            head_stylesheets: Vec::new(),
        }
    }

    /// Plain HTML. `/index.html`, when present, is served as is.
    pub fn html() -> Self {
        Self::new("html")
    }

    /// React 18 rendering `./app` into `#root`, with registry components.
    pub fn react() -> Self {
        Self::new("react")
            .with_entry_point("/main.tsx")
            .with_inject("/.misc/react-shim.ts")
            .with_dependency("react", REACT_VERSION)
            .with_dependency("react-dom", REACT_VERSION)
            .with_file("/.misc/react-shim.ts", r#"import * as React from "react"; export { React };"#)
            .with_file("/main.tsx", VirtualFile::generated(react_entry))
            .with_hook(ComponentRegistryHook::new(ComponentRegistryOptions {
                theme: "default".to_string(),
                version: REGISTRY_VERSION.to_string(),
            }))
            .with_head_script(TAILWIND_CDN)
    }

    /// Vue 3 mounting `./App.vue` into `#app`.
    ///
    /// Components are compiled by [`VueSfcHook`] with the session's
    /// [`crate::hook::SfcCompiler`].
    pub fn vue() -> Self {
        Self::new("vue")
            .with_entry_point("/main.ts")
            .with_dependency("vue", VUE_VERSION)
            .with_dependency("entities", ENTITIES_VERSION)
            .with_file("/style.css", "")
            .with_file("/App.vue", DEFAULT_VUE_APP)
            .with_file("/main.ts", VirtualFile::generated(vue_entry))
            .with_hook(VueSfcHook::new())
            .with_mount_id("app")
            .with_head_script(TAILWIND_CDN)
    }

    /// Add an entry point.
    pub fn with_entry_point(mut self, path: impl Into<String>) -> Self {
        self.entry_points.push(path.into());
        self
    }

    /// Add a module injected into every module.
    pub fn with_inject(mut self, path: impl Into<String>) -> Self {
        self.inject.push(path.into());
        self
    }

    /// Pin a dependency version.
    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), version.into());
        self
    }

    /// Add a file underneath the caller's files.
    pub fn with_file(mut self, path: impl Into<String>, file: impl Into<VirtualFile>) -> Self {
        self.files.insert(path, file);
        self
    }

    /// Append a hook.
    pub fn with_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Id of the element the application mounts on.
    pub fn with_mount_id(mut self, id: impl Into<String>) -> Self {
        self.mount_id = id.into();
        self
    }

    /// Load a script from `url` in the document head.
    pub fn with_head_script(mut self, url: impl Into<String>) -> Self {
        self.head_scripts.push(url.into());
        self
    }

    /// Link a stylesheet from `url` in the document head.
    pub fn with_head_stylesheet(mut self, url: impl Into<String>) -> Self {
        self.head_stylesheets.push(url.into());
        self
    }

    /// Id of the mount element.
    pub fn mount_id(&self) -> &str {
        &self.mount_id
    }
}

impl Preset for StandardPreset {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_points(&self) -> Vec<String> {
        self.entry_points.clone()
    }

    fn inject(&self) -> Vec<String> {
        self.inject.clone()
    }

    fn dependencies(&self) -> Dependencies {
        self.dependencies.clone()
    }

    fn files(&self) -> VirtualFiles {
        self.files.clone()
    }

    fn hooks(&self) -> HookPipeline {
        self.hooks.clone()
    }

    fn generate_html(&self, ctx: &BuildContext, output: &BuildOutput) -> String {
        if self.entry_points.is_empty()
            && let Some(index) = ctx.contents("/index.html")
        {
            return index.to_text_lossy();
        }

        let line = |tag: String| format!("    {tag}\n");
        let head: String = self
            .head_scripts
            .iter()
            .map(|url| line(format!("<script src=\"{url}\"></script>")))
            .chain(
                self.head_stylesheets
                    .iter()
                    .map(|url| line(format!("<link rel=\"stylesheet\" href=\"{url}\">"))),
            )
            .collect();

        let mut styles = String::new();
        let mut scripts = String::new();
        for file in &output.output_files {
            if file.path.ends_with(".js") {
                scripts.push_str(&line(format!("<script>{}</script>", escape_script(&file.text()))));
            } else if file.path.ends_with(".css") {
                styles.push_str(&line(format!("<style>{}</style>", file.text())));
            }
        }

        let mount = &self.mount_id;
        format!(
            "<html>
  <head>
    <title></title>
    <meta charset=\"UTF-8\">
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
{head}    <style>html,body,#{mount} {{height: 100%;}}</style>
{styles}  </head>
  <body>
    <div id=\"{mount}\"></div>
{scripts}  </body>
</html>"
        )
    }
}

/// Keep inlined code from closing its own `<script>` element.
fn escape_script(code: &str) -> String {
    code.replace("</script", "<\\/script")
}

fn include_lines(ctx: &BuildContext) -> String {
    ctx.includes
        .iter()
        .map(|path| format!("import '{path}';\n"))
        .collect()
}

fn react_entry(ctx: &BuildContext) -> crate::cache::Bytes {
    format!(
        "import {{ StrictMode }} from 'react';
import {{ createRoot }} from 'react-dom/client';
import App from './app';
{}
createRoot(document.getElementById('root')!).render(
  <StrictMode>
    <App />
  </StrictMode>,
);
",
        include_lines(ctx)
    )
    .into()
}

fn vue_entry(ctx: &BuildContext) -> crate::cache::Bytes {
    format!(
        "import {{ createApp }} from 'vue';
import './style.css';
import App from './App.vue';
{}
createApp(App).mount('#app');
",
        include_lines(ctx)
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::OutputFile;
    use crate::testing::{MemoryFetcher, registry};
    use std::sync::Arc;

    fn context(preset: StandardPreset, files: VirtualFiles) -> BuildContext {
        BuildContext::new(
            Arc::new(preset),
            files,
            FxHashMap::default(),
            registry(),
            Arc::new(MemoryFetcher::new()),
        )
    }

    #[test]
    fn test_auto_detect() {
        assert_eq!(auto_detect(["/index.html", "/app.tsx"]), PresetKind::React);
        assert_eq!(auto_detect(["/App.vue", "/main.jsx"]), PresetKind::React);
        assert_eq!(auto_detect(["/App.vue", "/style.css"]), PresetKind::Vue);
        assert_eq!(auto_detect(["/index.html"]), PresetKind::Html);
        assert_eq!(auto_detect([]), PresetKind::Html);
    }

    #[test]
    fn test_react_preset_shape() {
        let preset = StandardPreset::react();
        assert_eq!(preset.entry_points(), vec!["/main.tsx"]);
        assert_eq!(preset.inject(), vec!["/.misc/react-shim.ts"]);
        assert_eq!(preset.dependencies().get("react-dom").map(String::as_str), Some("18.3.1"));
        assert_eq!(preset.hooks().names(), vec!["component-registry"]);
        assert!(preset.files().get("/main.tsx").is_some_and(VirtualFile::is_generated));
    }

    #[test]
    fn test_vue_preset_shape() {
        let preset = StandardPreset::vue();
        assert_eq!(preset.entry_points(), vec!["/main.ts"]);
        assert_eq!(preset.mount_id(), "app");
        assert_eq!(preset.dependencies().get("entities").map(String::as_str), Some("4.5.0"));
        assert_eq!(preset.hooks().names(), vec!["vue-sfc"]);
        assert!(preset.files().contains("/App.vue"));
        assert!(preset.files().contains("/style.css"));
    }

    #[test]
    fn test_react_entry_imports_includes() {
        let mut ctx = context(StandardPreset::react(), VirtualFiles::new());
        ctx.add_include("/globals.css");

        let entry = ctx.contents("/main.tsx").unwrap().to_text_lossy();
        assert!(entry.contains("import App from './app';"));
        assert!(entry.contains("import '/globals.css';\n"));
    }

    #[test]
    fn test_generate_html_inlines_outputs() {
        let ctx = context(StandardPreset::react(), VirtualFiles::new());
        let output = BuildOutput {
            output_files: vec![
                OutputFile::new("bundle.js", "console.log('</script>')"),
                OutputFile::new("bundle.css", "body{margin:0}"),
                OutputFile::new("bundle.js.map", "{}"),
            ],
            ..Default::default()
        };

        let html = StandardPreset::react().generate_html(&ctx, &output);
        assert!(html.contains("<script>console.log('<\\/script>')</script>"));
        assert!(html.contains("<style>body{margin:0}</style>"));
        assert!(html.contains("<div id=\"root\"></div>"));
        assert!(html.contains(TAILWIND_CDN));
        assert!(!html.contains("{}"));
        assert!(html.find("<style>body").unwrap() < html.find("</head>").unwrap());
    }

    #[test]
    fn test_html_preset_serves_index() {
        let files: VirtualFiles = [("/index.html", "<h1>hi</h1>")].into_iter().collect();
        let ctx = context(StandardPreset::html(), files);
        let html = StandardPreset::html().generate_html(&ctx, &BuildOutput::default());
        assert_eq!(html, "<h1>hi</h1>");
    }

    #[test]
    fn test_custom_mount_and_stylesheet() {
        let preset = StandardPreset::new("custom")
            .with_entry_point("/index.ts")
            .with_mount_id("app")
            .with_head_stylesheet("https://cdn.test/reset.css");
        let ctx = context(preset.clone(), VirtualFiles::new());
        let html = preset.generate_html(&ctx, &BuildOutput::default());
        assert!(html.contains("<div id=\"app\"></div>"));
        assert!(html.contains("html,body,#app {height: 100%;}"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"https://cdn.test/reset.css\">"));
    }
}
