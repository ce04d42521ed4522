//! Built-in diagnostic analyzers and fixers

use crate::analyzer::{AnalyzerOptions, DiagnosticAnalyzer};
use crate::diagnostic::{Diagnostic, DiagnosticDescriptor, Location, Severity};
use crate::fixer::{CodeFixer, FixAllContext, FixError, TextEdit};
use crate::plugins::rules::find_unnecessary_imports;
use crate::workspace::{Project, Solution};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Unnecessary import directives
pub const UNNECESSARY_IMPORTS_ID: &str = "FMT0001";

fn unnecessary_imports_descriptor() -> DiagnosticDescriptor {
    DiagnosticDescriptor::new(
        UNNECESSARY_IMPORTS_ID,
        "Remove unnecessary imports",
        "{0} unnecessary import(s) in {1}",
        "Style",
    )
    .with_severity(Severity::Warning)
}

/// Reports one diagnostic per document listing every unnecessary import
///
/// Documents with conditional compilation are skipped: an import unused in
/// this configuration may be needed by another one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnnecessaryImportsAnalyzer;

impl DiagnosticAnalyzer for UnnecessaryImportsAnalyzer {
    fn name(&self) -> &str {
        "UnnecessaryImportsAnalyzer"
    }

    fn supported_diagnostics(&self) -> Vec<DiagnosticDescriptor> {
        vec![unnecessary_imports_descriptor()]
    }

    fn analyze(
        &self,
        solution: &Solution,
        project: &Project,
        _options: &AnalyzerOptions,
        cancel: &CancellationToken,
    ) -> Vec<Diagnostic> {
        let descriptor = unnecessary_imports_descriptor();
        let mut diagnostics = Vec::new();

        for id in project.document_ids() {
            if cancel.is_cancelled() {
                break;
            }
            let Some(document) = solution.document(*id) else {
                continue;
            };
            let model = document.semantic_model();
            if model.has_conditional_directives() {
                continue;
            }

            let lines = find_unnecessary_imports(model.as_ref());
            if lines.is_empty() {
                continue;
            }

            let spans = document.tree().body_line_spans();
            let locations: Vec<Location> = lines
                .iter()
                .filter_map(|line| spans.get(*line))
                .map(|span| Location::in_document(document, span.clone()))
                .collect();
            let Some(primary) = locations.first().cloned() else {
                continue;
            };

            let message =
                descriptor.format_message(&[&locations.len().to_string(), document.name()]);
            diagnostics.push(
                Diagnostic::new(&descriptor, &message, primary)
                    .with_additional_locations(locations)
                    .with_analyzer(self.name()),
            );
        }

        diagnostics
    }
}

/// Deletes the import lines named by [`UnnecessaryImportsAnalyzer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnnecessaryImportsFixer;

impl CodeFixer for UnnecessaryImportsFixer {
    fn name(&self) -> &str {
        "UnnecessaryImportsFixer"
    }

    fn fixable_ids(&self) -> Vec<String> {
        vec![UNNECESSARY_IMPORTS_ID.to_string()]
    }

    fn fix_all(&self, context: &FixAllContext<'_>) -> Result<Vec<TextEdit>, FixError> {
        let mut spans = BTreeSet::new();
        for diagnostic in &context.diagnostics {
            for location in diagnostic.locations() {
                if context.solution.document(location.document).is_none() {
                    return Err(FixError::Failed(format!(
                        "{} is not part of the solution",
                        location.file.display()
                    )));
                }
                spans.insert((location.document, location.span.start, location.span.end));
            }
        }

        Ok(spans
            .into_iter()
            .map(|(document, start, end)| TextEdit::delete(document, start..end))
            .collect())
    }
}

/// Analyzers shipped with the formatter
pub fn builtin_analyzers() -> Vec<Arc<dyn DiagnosticAnalyzer>> {
    vec![Arc::new(UnnecessaryImportsAnalyzer)]
}

/// Fixers shipped with the formatter
pub fn builtin_fixers() -> Vec<Arc<dyn CodeFixer>> {
    vec![Arc::new(UnnecessaryImportsFixer)]
}
