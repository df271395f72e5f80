//! Test doubles: an in-memory registry and a scanning compiler.

use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};

use crate::cache::Bytes;
use crate::compiler::{
    BuildOptions, BuildOutput, Compiler, CompilerFailure, LoadArgs, Loader, Message, OutputFile, Plugin,
    ResolveArgs,
};
use crate::config::RegistryUrls;
use crate::fetch::{FetchError, Fetcher};
use crate::hook::sfc::{
    CompiledBlock, SfcBlock, SfcCompiler, SfcDescriptor, SfcError, SfcLocation, SfcScript, StyleRequest,
    TemplateRequest,
};

/// Registry endpoints used by tests.
pub fn registry() -> RegistryUrls {
    RegistryUrls {
        npm: "https://npm.test".to_string(),
        data: "https://data.test".to_string(),
        gh: "https://gh.test".to_string(),
    }
}

// =============================================================================
// MemoryFetcher
// =============================================================================

/// Serves registered URLs, answers 404 otherwise, and counts every request.
#[derive(Default)]
pub struct MemoryFetcher {
    responses: RwLock<FxHashMap<String, Bytes>>,
    requests: Mutex<FxHashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, url: &str, body: impl Into<Bytes>) {
        self.responses.write().insert(url.to_string(), body.into());
    }

    pub fn add_json(&self, url: &str, json: &str) {
        self.add(url, json);
    }

    /// Register a manifest (under `version` and `latest`) and a listing.
    /// `fields` is spliced into the manifest object.
    pub fn add_package(&self, name: &str, version: &str, fields: &str, files: &[&str]) {
        let urls = registry();
        let manifest = format!(r#"{{ "name": "{name}", "version": "{version}", {fields} }}"#);
        self.add_json(&urls.manifest(name, version, ""), &manifest);
        self.add_json(&urls.manifest(name, "latest", ""), &manifest);
        self.add(&urls.listing(name, version), listing(name, version, files).to_string());
    }

    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }
}

impl Fetcher for MemoryFetcher {
    fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        *self.requests.lock().entry(url.to_string()).or_default() += 1;
        self.responses
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Registry listing document for a flat list of package file paths.
fn listing(name: &str, version: &str, files: &[&str]) -> Value {
    #[derive(Default)]
    struct Dir {
        dirs: BTreeMap<String, Dir>,
        files: Vec<String>,
    }

    fn to_json(dir: &Dir) -> Vec<Value> {
        let dirs = dir
            .dirs
            .iter()
            .map(|(name, sub)| json!({ "type": "directory", "name": name, "files": to_json(sub) }));
        let files = dir.files.iter().map(|name| json!({ "type": "file", "name": name }));
        dirs.chain(files).collect()
    }

    let mut root = Dir::default();
    for file in files {
        let mut segments: Vec<&str> = file.split('/').filter(|s| !s.is_empty()).collect();
        let Some(leaf) = segments.pop() else { continue };
        let dir = segments
            .into_iter()
            .fold(&mut root, |dir, segment| dir.dirs.entry(segment.to_string()).or_default());
        dir.files.push(leaf.to_string());
    }

    json!({ "type": "npm", "name": name, "version": version, "files": to_json(&root) })
}

// =============================================================================
// ScanCompiler
// =============================================================================

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:[\w*{}\s,]+\s+from\s+)?["']([^"']+)["']"#).expect("valid regex")
});

/// Walks `import` statements through the plugin and concatenates what it
/// loads: scripts into the outfile, stylesheets into a `.css` sibling.
pub struct ScanCompiler {
    name: String,
    fail_init: bool,
    failure: Option<CompilerFailure>,
    initialized: AtomicUsize,
    resolved: Mutex<Vec<String>>,
}

impl ScanCompiler {
    /// A compiler with its own gate key.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_init: false,
            failure: None,
            initialized: AtomicUsize::new(0),
            resolved: Mutex::new(Vec::new()),
        }
    }

    /// A compiler whose every build raises `failure`.
    pub fn failing(name: &str, failure: CompilerFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(name)
        }
    }

    pub fn with_failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Every path returned by the plugin's resolve, in call order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }
}

impl Compiler for ScanCompiler {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<(), CompilerFailure> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(CompilerFailure::Other("runtime unavailable".to_string()));
        }
        Ok(())
    }

    fn build(&self, options: &BuildOptions, plugin: &dyn Plugin) -> Result<BuildOutput, CompilerFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut js = String::new();
        let mut css = String::new();
        let mut seen = FxHashSet::default();

        let mut queue: VecDeque<(String, String, Option<Value>)> = options
            .inject
            .iter()
            .chain(&options.entry_points)
            .map(|entry| (entry.clone(), String::new(), None))
            .collect();

        while let Some((spec, importer, plugin_data)) = queue.pop_front() {
            let at = |text: String| {
                let message = Message::new(text);
                if importer.is_empty() { message } else { message.at(importer.as_str(), 1, 0) }
            };

            let resolved = match plugin.resolve(&ResolveArgs {
                path: spec.clone(),
                importer: importer.clone(),
                plugin_data,
            }) {
                Ok(Some(resolved)) => resolved,
                Ok(None) if spec.starts_with("data:") => continue,
                Ok(None) => {
                    errors.push(at(format!("Could not resolve \"{spec}\"")));
                    continue;
                }
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };

            self.resolved.lock().push(resolved.path.clone());
            if !seen.insert(resolved.path.clone()) {
                continue;
            }

            let args = LoadArgs {
                path: resolved.path.clone(),
                plugin_data: resolved.plugin_data,
            };
            let loaded = match plugin.load(&args) {
                Ok(Some(loaded)) => loaded,
                Ok(None) => {
                    errors.push(at(format!("Could not load \"{}\"", args.path)));
                    continue;
                }
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };

            errors.extend(loaded.errors);
            warnings.extend(loaded.warnings);
            let text = loaded.contents.to_text_lossy();
            if loaded.loader == Loader::Css {
                css.push_str(&text);
                continue;
            }

            js.push_str(&format!("// {}\n{text}\n", args.path));
            for capture in IMPORT.captures_iter(&text) {
                queue.push_back((capture[1].to_string(), args.path.clone(), loaded.plugin_data.clone()));
            }
        }

        if !errors.is_empty() {
            return Err(CompilerFailure::Messages { errors, warnings });
        }

        let mut output_files = vec![OutputFile::new(options.outfile.clone(), js)];
        if !css.is_empty() {
            let stem = options.outfile.trim_end_matches(".js");
            output_files.push(OutputFile::new(format!("{stem}.css"), css));
        }

        Ok(BuildOutput {
            output_files,
            errors: Vec::new(),
            warnings,
        })
    }
}

// =============================================================================
// TagSfcCompiler
// =============================================================================

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(template|script|style)([^>]*)>(.*?)</(?:template|script|style)>").expect("valid regex")
});
static ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w-]+)(?:="([^"]*)")?"#).expect("valid regex"));

/// Splits components on their top-level tags. Templates compile to a
/// `render` returning the markup; `<bad` in a template and `@bad` in a style
/// are reported as errors at their position.
#[derive(Default)]
pub struct TagSfcCompiler;

fn position(source: &str, needle: &str) -> Option<SfcLocation> {
    let offset = source.find(needle)?;
    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Some(SfcLocation {
        file: None,
        line: before.matches('\n').count() + 1,
        column: offset - line_start,
        source: Some(needle.to_string()),
    })
}

impl SfcCompiler for TagSfcCompiler {
    fn parse(&self, source: &str, filename: &str) -> Result<SfcDescriptor, Vec<SfcError>> {
        let mut descriptor = SfcDescriptor {
            filename: filename.to_string(),
            ..Default::default()
        };

        for capture in BLOCK.captures_iter(source) {
            let content = capture.get(3).map_or("", |m| m.as_str());
            let start = capture.get(3).map_or(0, |m| m.start());
            let mut block = SfcBlock {
                content: content.to_string(),
                start_line: source[..start].matches('\n').count() + 1,
                ..Default::default()
            };
            let mut setup = false;
            for attr in ATTR.captures_iter(&capture[2]) {
                let value = attr.get(2).map(|m| m.as_str().to_string());
                match &attr[1] {
                    "lang" => block.lang = value,
                    "src" => block.src = value,
                    "scoped" => block.scoped = true,
                    "setup" => setup = true,
                    _ => {}
                }
            }
            match &capture[1] {
                "template" => descriptor.template = Some(block),
                "script" if setup => descriptor.script_setup = Some(block),
                "script" => descriptor.script = Some(block),
                _ => descriptor.styles.push(block),
            }
        }

        if descriptor.template.is_none() && !descriptor.has_script() && descriptor.styles.is_empty() {
            return Err(vec![SfcError::new(format!("{filename} has no blocks"))]);
        }
        Ok(descriptor)
    }

    fn compile_script(&self, descriptor: &SfcDescriptor, _id: &str) -> Result<SfcScript, SfcError> {
        let block = descriptor
            .script_setup
            .as_ref()
            .or(descriptor.script.as_ref())
            .ok_or_else(|| SfcError::new("no script"))?;
        Ok(SfcScript {
            content: block.content.clone(),
            lang: block.lang.clone(),
            bindings: descriptor.script_setup.as_ref().map(|_| json!({ "setup": true })),
        })
    }

    fn compile_template(&self, request: &TemplateRequest<'_>) -> CompiledBlock {
        if let Some(location) = position(request.source, "<bad") {
            return CompiledBlock {
                errors: vec![SfcError {
                    message: "Invalid end tag.".to_string(),
                    location: Some(location),
                }],
                ..Default::default()
            };
        }
        CompiledBlock {
            code: format!(
                "export function render() {{ return {}; }} // {}",
                Value::from(request.source.trim()),
                request.id
            ),
            ..Default::default()
        }
    }

    fn compile_style(&self, request: &StyleRequest<'_>) -> CompiledBlock {
        if let Some(location) = position(request.source, "@bad") {
            return CompiledBlock {
                errors: vec![SfcError {
                    message: "Unknown at rule".to_string(),
                    location: Some(SfcLocation {
                        file: Some(request.filename.to_string()),
                        ..location
                    }),
                }],
                ..Default::default()
            };
        }
        let code = if request.scoped {
            format!("/* {} */{}", request.id, request.source.trim())
        } else {
            request.source.trim().to_string()
        };
        CompiledBlock {
            code,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::FileListing;

    #[test]
    fn test_listing_round_trips_through_parser() {
        let doc = listing("pkg", "1.0.0", &["/index.js", "/client/package.json", "/client/index.js"]);
        let parsed = FileListing::parse("u", doc.to_string().as_bytes()).unwrap();
        let mut files = parsed.flatten();
        files.sort();
        assert_eq!(files, vec!["/client/index.js", "/client/package.json", "/index.js"]);
    }

    #[test]
    fn test_tag_sfc_parse() {
        let source = "<script setup lang=\"ts\">\nconst a = 1;\n</script>\n\n<template>\n  <p>{{ a }}</p>\n</template>\n<style scoped>\np { color: red }\n</style>\n";
        let descriptor = TagSfcCompiler.parse(source, "/App.vue").unwrap();
        let setup = descriptor.script_setup.unwrap();
        assert_eq!(setup.lang.as_deref(), Some("ts"));
        assert_eq!(setup.start_line, 1);
        assert_eq!(descriptor.template.unwrap().start_line, 5);
        assert_eq!(descriptor.styles.len(), 1);
        assert!(descriptor.styles[0].scoped);
        assert_eq!(descriptor.styles[0].start_line, 8);
    }

    #[test]
    fn test_import_pattern() {
        let source = "import a from 'a';\nimport { b, c } from \"b\";\nimport './c.css';\nexport * from './d';\nexport default 1;";
        let found: Vec<_> = IMPORT.captures_iter(source).map(|c| c[1].to_string()).collect();
        assert_eq!(found, vec!["a", "b", "./c.css", "./d"]);
    }
}
