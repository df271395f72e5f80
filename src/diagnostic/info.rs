//! Structured diagnostic information for custom rendering.

use std::fmt;

use super::error::BuildError;
use super::filter::DiagnosticFilter;
use super::format::{DiagnosticOptions, format_one};
use crate::compiler::{Location, Message};

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The build did not produce usable output.
    Error,
    /// Output was produced but something looks wrong.
    Warning,
}

impl Severity {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// A single collected error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Message text.
    pub message: String,
    /// Source location, when the compiler knew one.
    pub location: Option<Location>,
}

impl Diagnostic {
    /// An error without location.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    /// A warning without location.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    /// Convert a compiler message.
    pub fn from_message(severity: Severity, message: &Message) -> Self {
        Self {
            severity,
            message: message.text.clone(),
            location: message.location.clone(),
        }
    }

    /// `[file:line:column] message`, or just the message without location.
    pub fn summary_line(&self) -> String {
        match &self.location {
            Some(loc) => format!("[{}:{}:{}] {}", loc.file, loc.line, loc.column, self.message),
            None => self.message.clone(),
        }
    }

    /// Whether the diagnostic points into a registry package.
    pub fn is_external(&self) -> bool {
        self.location
            .as_ref()
            .is_some_and(|loc| loc.file.starts_with(crate::resolve::NODE_MODULES))
    }
}

impl From<&BuildError> for Diagnostic {
    fn from(err: &BuildError) -> Self {
        Self::error(err.to_string())
    }
}

// ============================================================================
// DiagnosticSummary
// ============================================================================

/// Summary of diagnostic counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
}

impl DiagnosticSummary {
    /// Total number of diagnostics.
    pub fn total(&self) -> usize {
        self.errors + self.warnings
    }

    /// Whether there are any errors.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Whether there are any diagnostics at all.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (self.errors, self.warnings) {
            (0, 0) => write!(f, "no diagnostics"),
            (e, 0) => write!(f, "{e} error{}", plural(e)),
            (0, w) => write!(f, "{w} warning{}", plural(w)),
            (e, w) => write!(f, "{e} error{}, {w} warning{}", plural(e), plural(w)),
        }
    }
}

// ============================================================================
// Diagnostics (Collection)
// ============================================================================

/// The diagnostics of one build.
///
/// Callers decide success by inspecting this list, never by the presence
/// of output: a build may produce output and warnings, or output and errors
/// from an earlier best-effort pass.
///
/// # Example
///
/// ```ignore
/// let report = builder.build();
/// if report.diagnostics.has_errors() {
///     eprintln!("{}", report.diagnostics);
/// }
/// for diag in report.diagnostics.warnings() {
///     println!("warning: {}", diag.message);
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty diagnostics collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a vector of diagnostics.
    pub fn from_vec(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }

    /// Append one diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Append compiler messages with the given severity.
    pub fn extend_messages(&mut self, severity: Severity, messages: &[Message]) {
        self.items
            .extend(messages.iter().map(|m| Diagnostic::from_message(severity, m)));
    }

    /// Check if there are no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Warning)
    }

    /// Get a summary of diagnostic counts.
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            errors: self.errors().count(),
            warnings: self.warnings().count(),
        }
    }

    /// Iterate over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Iterate over errors only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// One `[file:line:column] message` line per diagnostic.
    pub fn to_strings(&self) -> Vec<String> {
        self.items.iter().map(Diagnostic::summary_line).collect()
    }

    /// Format with custom options.
    pub fn with_options<'a>(&'a self, options: &'a DiagnosticOptions) -> DiagnosticsDisplay<'a> {
        DiagnosticsDisplay {
            diagnostics: self,
            options,
        }
    }

    /// Get a slice of all diagnostics.
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Keep only diagnostics that pass the predicate.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Diagnostic) -> bool,
    {
        Self {
            items: self.items.iter().filter(|d| predicate(d)).cloned().collect(),
        }
    }

    /// Drop diagnostics matching any of the given filters.
    pub fn filter_out(&self, filters: &[DiagnosticFilter]) -> Self {
        self.filter(|d| !filters.iter().any(|f| f.matches(d)))
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DiagnosticsDisplay {
            diagnostics: self,
            options: &DiagnosticOptions::default(),
        }
        .fmt(f)
    }
}

/// Display wrapper for formatting diagnostics with custom options.
pub struct DiagnosticsDisplay<'a> {
    diagnostics: &'a Diagnostics,
    options: &'a DiagnosticOptions,
}

impl fmt::Display for DiagnosticsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(&format_one(diag, self.options))?;
        }
        Ok(())
    }
}
