//! Vue single-file components.
//!
//! A `.vue` file is rewritten after loading into a small module that imports
//! each of its blocks through a query path:
//!
//! ```text
//! /App.vue                     ->  import script from "/App.vue?type=script";
//!   <script setup lang="ts">       import "/App.vue?type=style&index=0";
//!   <template>                     import { render } from "/App.vue?type=template";
//!   <style scoped>                 script.render = render; ...
//! ```
//!
//! The parsed component travels to those imports as plugin data, and
//! [`VueSfcHook::load_file`] answers each query path from it. Parsing and
//! block compilation are delegated to an [`SfcCompiler`] supplied with the
//! session; everything else happens here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::hash_string;
use crate::compiler::{LoadArgs, LoadResult, Loader, Message};
use crate::context::BuildContext;
use crate::diagnostic::{BuildError, Result};

use super::{Capabilities, Hook};

const NAME: &str = "vue-sfc";
const RENDER: &str = "render";

// =============================================================================
// Compiler Contract
// =============================================================================

/// A top-level block of a component file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfcBlock {
    /// Text between the opening and closing tags.
    pub content: String,
    /// `lang` attribute.
    pub lang: Option<String>,
    /// `src` attribute.
    pub src: Option<String>,
    /// `scoped` attribute (styles).
    pub scoped: bool,
    /// 1-based line of the component file the content starts on.
    pub start_line: usize,
}

/// A parsed component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfcDescriptor {
    /// Virtual path of the component file.
    pub filename: String,
    /// `<template>` block.
    pub template: Option<SfcBlock>,
    /// Classic `<script>` block.
    pub script: Option<SfcBlock>,
    /// `<script setup>` block.
    pub script_setup: Option<SfcBlock>,
    /// `<style>` blocks, in source order.
    pub styles: Vec<SfcBlock>,
    /// Whether the template uses slotted selectors.
    pub slotted: bool,
}

impl SfcDescriptor {
    /// Whether the component has any script block.
    pub fn has_script(&self) -> bool {
        self.script.is_some() || self.script_setup.is_some()
    }

    /// Whether any style block is scoped.
    pub fn has_scoped_style(&self) -> bool {
        self.styles.iter().any(|style| style.scoped)
    }
}

/// The component's script blocks compiled into one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SfcScript {
    /// Module source.
    pub content: String,
    /// Source language (`ts` or plain script).
    pub lang: Option<String>,
    /// Template binding metadata.
    pub bindings: Option<Value>,
}

/// Position of an [`SfcError`], relative to the compiled block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcLocation {
    /// File the error belongs to; the block's own path when absent.
    pub file: Option<String>,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    /// Offending source text.
    pub source: Option<String>,
}

/// An error raised by an [`SfcCompiler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcError {
    /// Message text.
    pub message: String,
    /// Where it happened.
    pub location: Option<SfcLocation>,
}

impl SfcError {
    /// An error without location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }
}

/// Output of a template or style compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBlock {
    /// Generated code.
    pub code: String,
    /// Errors; the code is ignored when any are present.
    pub errors: Vec<SfcError>,
    /// Non-fatal hints.
    pub tips: Vec<String>,
}

/// Input of [`SfcCompiler::compile_template`].
#[derive(Debug, Clone, Copy)]
pub struct TemplateRequest<'a> {
    /// Scope id (`data-v-...`).
    pub id: &'a str,
    /// Path the template is loaded under.
    pub filename: &'a str,
    /// Template source.
    pub source: &'a str,
    /// Whether any style block is scoped.
    pub scoped: bool,
    /// Whether the template uses slotted selectors.
    pub slotted: bool,
    /// Binding metadata of the compiled script.
    pub bindings: Option<&'a Value>,
}

/// Input of [`SfcCompiler::compile_style`].
#[derive(Debug, Clone, Copy)]
pub struct StyleRequest<'a> {
    /// Scope id (`data-v-...`).
    pub id: &'a str,
    /// Path the style is loaded under.
    pub filename: &'a str,
    /// Style source.
    pub source: &'a str,
    /// Preprocessor language.
    pub lang: Option<&'a str>,
    /// Whether selectors are scoped to the component.
    pub scoped: bool,
}

/// Parser and block compiler for single-file components.
///
/// Usually backed by the same runtime as the bundling [`crate::Compiler`].
pub trait SfcCompiler: Send + Sync {
    /// Split a component file into blocks.
    fn parse(&self, source: &str, filename: &str) -> std::result::Result<SfcDescriptor, Vec<SfcError>>;

    /// Compile the script blocks. `id` is the component hash.
    fn compile_script(&self, descriptor: &SfcDescriptor, id: &str) -> std::result::Result<SfcScript, SfcError>;

    /// Compile the template into a module exporting `render`.
    fn compile_template(&self, request: &TemplateRequest<'_>) -> CompiledBlock;

    /// Compile a style block into plain CSS.
    fn compile_style(&self, request: &StyleRequest<'_>) -> CompiledBlock;
}

// =============================================================================
// VueSfcHook
// =============================================================================

/// Plugin data attached to a rewritten component.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ComponentData {
    id: String,
    descriptor: SfcDescriptor,
    script: Option<SfcScript>,
}

/// Compiles `.vue` files through the session's [`SfcCompiler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VueSfcHook;

impl VueSfcHook {
    /// Create the hook.
    pub fn new() -> Self {
        Self
    }
}

impl Hook for VueSfcHook {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_load_file().with_file_loaded()
    }

    fn load_file(&self, ctx: &BuildContext, args: &LoadArgs) -> Result<Option<LoadResult>> {
        let Some((file, query)) = args.path.split_once('?') else {
            return Ok(None);
        };
        if !file.ends_with(".vue") {
            return Ok(None);
        }

        let data = component_data(args)?;
        match query_param(query, "type") {
            Some("script") => Ok(data.script.map(|script| {
                let loader = match script.lang.as_deref() {
                    Some("ts") => Loader::Ts,
                    _ => Loader::Js,
                };
                LoadResult::new(script.content, loader)
            })),
            Some("template") => load_template(compiler(ctx)?, args, &data).map(Some),
            Some("style") => load_style(compiler(ctx)?, args, &data, query).map(Some),
            _ => Ok(None),
        }
    }

    fn file_loaded(&self, ctx: &BuildContext, args: &LoadArgs, result: &mut LoadResult) -> Result<()> {
        if !args.path.ends_with(".vue") {
            return Ok(());
        }
        let compiler = compiler(ctx)?;

        let source = result.contents.to_text_lossy();
        let descriptor = match compiler.parse(&source, &args.path) {
            Ok(descriptor) => descriptor,
            Err(errors) => {
                let file = args.path.as_str();
                result
                    .errors
                    .extend(errors.into_iter().map(|err| block_message(err, file, file, 1)));
                return Ok(());
            }
        };

        let hash = hash_string(&args.path);
        let script = if descriptor.has_script() {
            let script = compiler
                .compile_script(&descriptor, &hash)
                .map_err(|err| BuildError::hook(NAME, format!("{}: {}", args.path, err.message)))?;
            Some(script)
        } else {
            None
        };

        let data = ComponentData {
            id: format!("data-v-{hash}"),
            descriptor,
            script,
        };
        log::debug!("{NAME}: {} -> {} style block(s)", args.path, data.descriptor.styles.len());

        result.contents = component_module(&args.path, &data).into();
        result.plugin_data = Some(
            serde_json::to_value(&data).map_err(|err| BuildError::hook(NAME, err.to_string()))?,
        );
        Ok(())
    }
}

fn compiler(ctx: &BuildContext) -> Result<&Arc<dyn SfcCompiler>> {
    ctx.sfc
        .as_ref()
        .ok_or_else(|| BuildError::hook(NAME, "no single-file component compiler configured"))
}

fn component_data(args: &LoadArgs) -> Result<ComponentData> {
    let value = args
        .plugin_data
        .clone()
        .ok_or_else(|| BuildError::hook(NAME, format!("{} imported outside its component", args.path)))?;
    serde_json::from_value(value).map_err(|err| BuildError::hook(NAME, err.to_string()))
}

/// The module replacing a component file.
fn component_module(path: &str, data: &ComponentData) -> String {
    let escaped = path.replace('\\', "\\\\");
    let descriptor = &data.descriptor;
    let mut lines = Vec::new();

    if descriptor.has_script() {
        let src = descriptor
            .script
            .as_ref()
            .filter(|_| descriptor.script_setup.is_none())
            .and_then(|script| script.src.as_deref())
            .unwrap_or(escaped.as_str());
        lines.push(format!("import script from \"{src}?type=script\";"));
    } else {
        lines.push("const script = {};".to_string());
    }

    for index in 0..descriptor.styles.len() {
        lines.push(format!("import \"{escaped}?type=style&index={index}\";"));
    }

    lines.push(format!("import {{ {RENDER} }} from \"{escaped}?type=template\";"));
    lines.push(format!("script.{RENDER} = {RENDER};"));
    lines.push(format!("script.__file = {};", Value::from(path)));
    if descriptor.has_scoped_style() {
        lines.push(format!("script.__scopeId = {};", Value::from(data.id.as_str())));
    }
    lines.push("export default script;".to_string());

    let mut module = lines.join("\n");
    module.push('\n');
    module
}

fn load_template(compiler: &Arc<dyn SfcCompiler>, args: &LoadArgs, data: &ComponentData) -> Result<LoadResult> {
    let descriptor = &data.descriptor;
    let template = descriptor
        .template
        .as_ref()
        .ok_or_else(|| BuildError::hook(NAME, format!("no template found in {}", descriptor.filename)))?;

    let compiled = compiler.compile_template(&TemplateRequest {
        id: &data.id,
        filename: &args.path,
        source: &template.content,
        scoped: descriptor.has_scoped_style(),
        slotted: descriptor.slotted,
        bindings: data.script.as_ref().and_then(|script| script.bindings.as_ref()),
    });

    Ok(compiled_result(compiled, Loader::Ts, args, descriptor, template.start_line))
}

fn load_style(
    compiler: &Arc<dyn SfcCompiler>,
    args: &LoadArgs,
    data: &ComponentData,
    query: &str,
) -> Result<LoadResult> {
    let descriptor = &data.descriptor;
    let index = query_param(query, "index").unwrap_or("0");
    let style = index
        .parse::<usize>()
        .ok()
        .and_then(|i| descriptor.styles.get(i))
        .ok_or_else(|| BuildError::hook(NAME, format!("style block {index} not found in {}", descriptor.filename)))?;

    let compiled = compiler.compile_style(&StyleRequest {
        id: &data.id,
        filename: &args.path,
        source: &style.content,
        lang: style.lang.as_deref(),
        scoped: style.scoped,
    });

    Ok(compiled_result(compiled, Loader::Css, args, descriptor, style.start_line))
}

/// Turn a compiled block into a load result, mapping error positions from
/// the block onto the component file.
fn compiled_result(
    compiled: CompiledBlock,
    loader: Loader,
    args: &LoadArgs,
    descriptor: &SfcDescriptor,
    start_line: usize,
) -> LoadResult {
    if !compiled.errors.is_empty() {
        let mut result = LoadResult::new("", loader);
        result.errors = compiled
            .errors
            .into_iter()
            .map(|err| block_message(err, &args.path, &descriptor.filename, start_line))
            .collect();
        return result;
    }

    let mut result = LoadResult::new(compiled.code, loader);
    result.warnings = compiled.tips.into_iter().map(Message::new).collect();
    result
}

/// Errors inside the block (`block_file`) are shifted to component-file lines
/// and reported against `component_file`; errors elsewhere keep their
/// position, minus any query.
fn block_message(err: SfcError, block_file: &str, component_file: &str, start_line: usize) -> Message {
    let Some(loc) = err.location else {
        return Message::new(err.message);
    };

    let file = loc.file.as_deref().unwrap_or(block_file);
    let (file, line) = if file == block_file {
        (component_file, start_line + loc.line.saturating_sub(1))
    } else {
        (file.split('?').next().unwrap_or(file), loc.line)
    };

    let mut message = Message::new(err.message).at(file, line, loc.column);
    if let Some(location) = &mut message.location {
        location.line_text = loc.source;
    }
    message
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
}
