//! Human-readable text output formatter

use super::{OutputFormatter, TargetReport};
use crate::diagnostic::{Diagnostic, Severity};
use crate::fixer::generate_unified_diff;
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Print a unified diff for every changed file
    pub show_diff: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_diff: false,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    pub fn with_diff(mut self, show_diff: bool) -> Self {
        self.show_diff = show_diff;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
            Severity::Hidden => s.dimmed(),
        }
    }

    fn format_diff(&self, diff: &str) -> String {
        let mut output = String::new();
        for line in diff.lines() {
            let painted = if !self.colored {
                line.normal()
            } else if line.starts_with("+++") || line.starts_with("---") {
                line.bold()
            } else if line.starts_with('+') {
                line.green()
            } else if line.starts_with('-') {
                line.red()
            } else if line.starts_with("@@") {
                line.cyan()
            } else {
                line.normal()
            };
            output.push_str(&format!("{}\n", painted));
        }
        output
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &TargetReport<'_>) -> String {
        let mut output = String::new();
        let applied = report.applied;
        let run = report.run;

        output.push_str(&format!(
            "{}\n",
            self.paint(&report.target.display().to_string(), |s| s.underline())
        ));

        let verb = if applied.dry_run {
            "Would format"
        } else {
            "Formatted"
        };
        for change in &applied.changes {
            output.push_str(&format!("  {} {}\n", verb, change.path.display()));
            if self.show_diff {
                let diff = generate_unified_diff(&change.path, &change.old_text, &change.new_text);
                output.push_str(&self.format_diff(&diff));
            }
        }

        for path in &applied.removed {
            output.push_str(&format!(
                "  {}: {} was removed from the solution and left on disk\n",
                self.paint("warning", |s| s.yellow().bold()),
                path.display()
            ));
        }

        for skipped in &run.skipped {
            output.push_str(&format!(
                "  {} {} ({})\n",
                self.paint("Skipped", |s| s.yellow()),
                skipped.path.display(),
                skipped.reason
            ));
        }

        for diagnostic in &run.diagnostics {
            output.push_str("  ");
            output.push_str(&self.format_diagnostic(diagnostic));
        }

        for failure in &run.failures {
            output.push_str(&format!(
                "  {}: project {}: {}\n",
                self.paint("error", |s| s.red().bold()),
                failure.project,
                failure.message
            ));
        }

        if run.edits_dropped > 0 {
            output.push_str(&format!(
                "  {}: {} overlapping fix edit(s) dropped\n",
                self.paint("warning", |s| s.yellow().bold()),
                run.edits_dropped
            ));
        }

        if run.cancelled {
            output.push_str(&format!(
                "  {}, no files written\n",
                self.paint("Cancelled", |s| s.red())
            ));
        }

        if self.show_stats {
            output.push_str(&format!(
                "\n{} of {} {} changed",
                applied.changes.len(),
                report.documents,
                if report.documents == 1 {
                    "document"
                } else {
                    "documents"
                }
            ));
            if !run.skipped.is_empty() {
                output.push_str(&format!(", {} skipped", run.skipped.len()));
            }
            output.push('\n');
            output.push_str(&format!(
                "Finished in {:.2}s\n",
                run.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        format!(
            "{}:{}:{}: {}[{}]: {}\n",
            diag.location.file.display(),
            diag.location.line,
            diag.location.column,
            self.severity_str(diag.severity),
            self.paint(&diag.id, |s| s.cyan()),
            diag.message
        )
    }
}
