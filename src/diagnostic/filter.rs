//! Diagnostic filtering utilities.

use super::info::{Diagnostic, Severity};

/// Filter type for matching diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterType {
    /// Match all diagnostics.
    All,
    /// Match diagnostics located inside registry packages.
    ExternalPackages,
    /// Match diagnostics containing specific text in message.
    MessageContains(String),
}

impl FilterType {
    fn matches(&self, diag: &Diagnostic) -> bool {
        match self {
            FilterType::All => true,
            FilterType::ExternalPackages => diag.is_external(),
            FilterType::MessageContains(text) => diag.message.contains(text.as_str()),
        }
    }
}

/// Filter for excluding diagnostics.
///
/// ```ignore
/// use virtual_bundler::diagnostic::{DiagnosticFilter, FilterType, Severity};
///
/// // Hide warnings raised inside /node_modules/
/// let quiet = report.diagnostics.filter_out(&[
///     DiagnosticFilter::new(Severity::Warning, FilterType::ExternalPackages),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFilter {
    /// The severity to match (Error or Warning).
    pub severity: Severity,
    /// The filter type to apply.
    pub filter: FilterType,
}

impl DiagnosticFilter {
    /// Create a new diagnostic filter.
    pub fn new(severity: Severity, filter: FilterType) -> Self {
        Self { severity, filter }
    }

    pub(crate) fn matches(&self, diag: &Diagnostic) -> bool {
        diag.severity == self.severity && self.filter.matches(diag)
    }
}
