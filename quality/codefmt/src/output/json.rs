//! JSON output formatter

use super::{OutputFormatter, TargetReport};
use crate::diagnostic::Diagnostic;
use crate::engine::ProjectFailure;
use crate::filter::SkippedDocument;
use crate::options::FormatMode;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| {
            log::error!("Failed to serialize output: {}", e);
            String::new()
        })
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    target: String,
    mode: FormatMode,
    dry_run: bool,
    cancelled: bool,
    changed: Vec<String>,
    removed: Vec<String>,
    skipped: &'a [SkippedDocument],
    diagnostics: &'a [Diagnostic],
    failures: &'a [ProjectFailure],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    documents: usize,
    changed: usize,
    skipped: usize,
    edits_applied: usize,
    edits_dropped: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &TargetReport<'_>) -> String {
        let run = report.run;
        let applied = report.applied;

        let output = JsonOutput {
            target: report.target.display().to_string(),
            mode: run.mode,
            dry_run: applied.dry_run,
            cancelled: run.cancelled,
            changed: applied
                .changes
                .iter()
                .map(|c| c.path.display().to_string())
                .collect(),
            removed: applied
                .removed
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            skipped: &run.skipped,
            diagnostics: &run.diagnostics,
            failures: &run.failures,
            summary: JsonSummary {
                documents: report.documents,
                changed: applied.changes.len(),
                skipped: run.skipped.len(),
                edits_applied: run.edits_applied,
                edits_dropped: run.edits_dropped,
                duration_ms: run.duration.as_millis(),
            },
        };

        self.render(&output)
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.render(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::{applied, run_report};
    use std::path::Path;

    #[test]
    fn test_json_output() {
        let run = run_report();
        let applied = applied();
        let report = TargetReport {
            target: Path::new("app.rsp"),
            documents: 2,
            run: &run,
            applied: &applied,
        };

        let output = JsonFormatter::new().format(&report);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["target"], "app.rsp");
        assert_eq!(value["mode"], "rules");
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["changed"][0], "src/A.cs");
        assert_eq!(value["skipped"][0]["reason"], "is read-only");
        assert_eq!(value["summary"]["duration_ms"], 1500);
        assert_eq!(value["summary"]["edits_dropped"], 0);
    }
}
