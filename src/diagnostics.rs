//! Diagnostics
//!
//! Collects the non-fatal findings of a validation pass. Fatal conditions
//! abort traversal through `FelisError`; everything recorded here lets the
//! build continue.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Identity ===
    /// `@id` already registered earlier in the document
    DuplicateId,

    // === Columns ===
    /// Sized or timestamp column declared without a `length`
    MissingLength,
    /// `length` given for a type that ignores it
    IgnoredLength,
    /// Sized or timestamp column without any VOTable array size source
    MissingArraysize,

    // === Versions ===
    /// Unrecognized key in a schema version object
    UnknownVersionKey,

    // === Metadata ===
    /// Foreign keys form a cycle, so tables keep document order
    ForeignKeyCycle,

    // === Documents ===
    /// The document failed validation
    ValidationFailed,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateId => "W001",
            Self::IgnoredLength => "W002",
            Self::UnknownVersionKey => "W003",
            Self::MissingArraysize => "W004",
            Self::ForeignKeyCycle => "W005",
            Self::MissingLength => "I001",
            Self::ValidationFailed => "E001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingLength => Severity::Info,

            Self::DuplicateId
            | Self::IgnoredLength
            | Self::UnknownVersionKey
            | Self::MissingArraysize
            | Self::ForeignKeyCycle => Severity::Warning,

            Self::ValidationFailed => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Object (or document) the finding is about
    pub object_id: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (e.g. the file a document came from)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(
        object_id: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.object_id
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from a validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record a finding; its severity comes from the code
    pub fn record(
        &mut self,
        object_id: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(object_id, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.with_severity(Severity::Warning)
    }

    /// Informational notes
    pub fn notes(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.with_severity(Severity::Info)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.severity() == severity)
    }

    /// Items carrying a specific code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if self.warning_count() > 0 {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::DuplicateId.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::MissingLength.severity(), Severity::Info);
        assert_eq!(DiagnosticCode::ValidationFailed.severity(), Severity::Error);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.record("#t", DiagnosticCode::DuplicateId, "Duplication of @id #t");
        diags.record("#t.c", DiagnosticCode::MissingLength, "no length");

        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.notes().count(), 1);
        assert!(!diags.has_errors());

        let mut other = Diagnostics::new();
        other.push(
            DiagnosticItem::new("a.json", DiagnosticCode::ValidationFailed, "bad")
                .with_context("while loading"),
        );
        diags.merge(other);
        assert_eq!(diags.len(), 3);
        assert!(diags.has_errors());

        let text = diags.format_all();
        assert!(text.contains("[W001] warning: Duplication of @id #t (#t)"));
        assert!(text.contains("  - while loading"));
        assert!(text.contains("1 error(s), 1 warning(s)"));
    }
}
