//! Diagnostic formatting utilities.

use std::fmt::Write;

use super::info::{Diagnostic, Diagnostics, Severity};

// ============================================================================
// Options
// ============================================================================

/// Display style for diagnostic output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayStyle {
    /// Header line plus the offending source line, when known.
    #[default]
    Rich,
    /// `file:line:col: severity: message` only.
    Short,
}

/// Options for controlling diagnostic formatting.
///
/// ```ignore
/// use virtual_bundler::diagnostic::{DiagnosticOptions, DisplayStyle};
///
/// // Plain text (no ANSI colors) for logging
/// let opts = DiagnosticOptions::plain();
///
/// // Short format for CI/IDE integration
/// let opts = DiagnosticOptions::short();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticOptions {
    /// Whether to use ANSI colors in output.
    pub colored: bool,
    /// Display style.
    pub style: DisplayStyle,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            colored: true,
            style: DisplayStyle::Rich,
        }
    }
}

impl DiagnosticOptions {
    /// Create options for plain text output (no ANSI colors).
    pub fn plain() -> Self {
        Self {
            colored: false,
            ..Self::default()
        }
    }

    /// Create options for short, uncolored output.
    pub fn short() -> Self {
        Self {
            colored: false,
            style: DisplayStyle::Short,
        }
    }

    /// Set whether to use colors.
    pub fn with_colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Set display style.
    pub fn with_style(mut self, style: DisplayStyle) -> Self {
        self.style = style;
        self
    }
}

// ============================================================================
// Coloring
// ============================================================================

#[cfg(feature = "colored-diagnostics")]
fn colorize(text: &str, severity: Severity) -> String {
    use owo_colors::OwoColorize;
    match severity {
        Severity::Error => text.red().bold().to_string(),
        Severity::Warning => text.yellow().bold().to_string(),
    }
}

#[cfg(feature = "colored-diagnostics")]
fn colorize_gutter(text: &str) -> String {
    use owo_colors::OwoColorize;
    text.cyan().to_string()
}

#[cfg(not(feature = "colored-diagnostics"))]
fn colorize(text: &str, _severity: Severity) -> String {
    text.to_owned()
}

#[cfg(not(feature = "colored-diagnostics"))]
fn colorize_gutter(text: &str) -> String {
    text.to_owned()
}

// ============================================================================
// Formatting
// ============================================================================

pub(crate) fn format_one(diag: &Diagnostic, options: &DiagnosticOptions) -> String {
    let label = if options.colored {
        colorize(diag.severity.as_str(), diag.severity)
    } else {
        diag.severity.as_str().to_owned()
    };

    let mut out = String::new();
    match (options.style, &diag.location) {
        (DisplayStyle::Short, Some(loc)) => {
            let _ = write!(out, "{}:{}:{}: {label}: {}", loc.file, loc.line, loc.column, diag.message);
        }
        (DisplayStyle::Short, None) | (DisplayStyle::Rich, None) => {
            let _ = write!(out, "{label}: {}", diag.message);
        }
        (DisplayStyle::Rich, Some(loc)) => {
            let bar = if options.colored { colorize_gutter("│") } else { "│".to_owned() };
            let _ = writeln!(out, "{label}: {}", diag.message);
            let _ = write!(out, "  ┌─ {}:{}:{}", loc.file, loc.line, loc.column);
            if let Some(text) = &loc.line_text {
                let width = loc.line.to_string().len();
                let _ = write!(out, "\n{:>width$} {bar} {text}", loc.line);
                let _ = write!(out, "\n{:>width$} {bar} {}^", "", " ".repeat(loc.column));
            }
        }
    }
    out
}

/// Format diagnostics with default options.
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    format_diagnostics_with_options(diagnostics, &DiagnosticOptions::default())
}

/// Format diagnostics with custom options.
pub fn format_diagnostics_with_options(diagnostics: &Diagnostics, options: &DiagnosticOptions) -> String {
    diagnostics.with_options(options).to_string()
}
