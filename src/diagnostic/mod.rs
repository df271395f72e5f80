//! Build diagnostics: error types, collected messages and formatting.

mod error;
mod filter;
mod format;
mod info;

pub use error::{BuildError, Result};
pub use filter::{DiagnosticFilter, FilterType};
pub use format::{DiagnosticOptions, DisplayStyle, format_diagnostics, format_diagnostics_with_options};
pub use info::{Diagnostic, DiagnosticSummary, Diagnostics, DiagnosticsDisplay, Severity};
