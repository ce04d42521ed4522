//! Output formatters for formatting runs

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::OutputFormat;
use crate::diagnostic::Diagnostic;
use crate::engine::RunReport;
use crate::workspace::ApplySummary;
use std::path::Path;

/// Everything reported for one target
pub struct TargetReport<'a> {
    pub target: &'a Path,
    /// Documents the target contained
    pub documents: usize,
    pub run: &'a RunReport,
    pub applied: &'a ApplySummary,
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the result of one target
    fn format(&self, report: &TargetReport<'_>) -> String;

    /// Format a single diagnostic
    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String;
}

/// Build the formatter for an output format
pub fn get_formatter(format: OutputFormat, colored: bool, show_diff: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new().with_diff(show_diff);
            if colored {
                Box::new(formatter)
            } else {
                Box::new(formatter.without_color())
            }
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    }
}
