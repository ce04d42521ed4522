//! Diagnostics reported by analyzers

use crate::workspace::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Not shown to users; still fixable
    Hidden,
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Hidden => write!(f, "hidden"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" | "silent" => Ok(Severity::Hidden),
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Static description of a diagnostic an analyzer can report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticDescriptor {
    /// Unique id (e.g., "FMT0001")
    pub id: String,
    pub title: String,
    /// Message with `{0}`-style placeholders
    pub message_format: String,
    pub category: String,
    pub default_severity: Severity,
    pub enabled_by_default: bool,
}

impl DiagnosticDescriptor {
    pub fn new(id: &str, title: &str, message_format: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            message_format: message_format.to_string(),
            category: category.to_string(),
            default_severity: Severity::Warning,
            enabled_by_default: true,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.default_severity = severity;
        self
    }

    pub fn with_enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    /// Substitute `{0}`, `{1}`, ... in the message format
    pub fn format_message(&self, args: &[&str]) -> String {
        let mut message = self.message_format.clone();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }
}

/// Source location of a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing)]
    pub document: DocumentId,
    /// File path (or document name for in-memory documents)
    pub file: PathBuf,
    /// Byte span in the document's full text
    pub span: Range<usize>,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Location {
    /// Locate a byte span inside a document
    pub fn in_document(document: &Document, span: Range<usize>) -> Self {
        let text = document.text();
        let start = span.start.min(text.len());
        let before = &text[..start];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(idx) => start - idx,
            None => start + 1,
        };

        Self {
            document: document.id(),
            file: document
                .path()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(document.name())),
            span,
            line,
            column,
        }
    }
}

/// A diagnostic reported by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    /// Primary location
    pub location: Location,
    /// Further locations the diagnostic covers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_locations: Vec<Location>,
    /// Analyzer that reported it
    pub analyzer: String,
}

impl Diagnostic {
    /// Create a diagnostic from its descriptor
    pub fn new(descriptor: &DiagnosticDescriptor, message: &str, location: Location) -> Self {
        Self {
            id: descriptor.id.clone(),
            severity: descriptor.default_severity,
            message: message.to_string(),
            location,
            additional_locations: Vec::new(),
            analyzer: String::new(),
        }
    }

    pub fn with_additional_locations(mut self, locations: Vec<Location>) -> Self {
        self.additional_locations = locations;
        self
    }

    pub fn with_analyzer(mut self, analyzer: &str) -> Self {
        self.analyzer = analyzer.to_string();
        self
    }

    /// Primary location followed by additional ones
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        std::iter::once(&self.location).chain(self.additional_locations.iter())
    }
}
