//! Diagnostic fix-all pipeline
//!
//! Per project: analyze, drop disabled ids, resolve every id to a fixer
//! (failing closed), run each fixer once over its batch, merge the edits and
//! apply them in one commit.

use crate::analyzer::{AnalyzerOptions, DiagnosticAnalyzer};
use crate::diagnostic::Diagnostic;
use crate::engine::EngineError;
use crate::filter::{FilterCache, FilterChain};
use crate::fixer::{EditBatch, FixAllContext, FixerRegistry, TextEdit};
use crate::rule::ToggleMap;
use crate::workspace::{ProjectId, Solution, WorkspaceError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of fixing one project
#[derive(Debug)]
pub struct FixAllOutcome {
    pub solution: Solution,
    /// Enabled diagnostics found
    pub diagnostics: Vec<Diagnostic>,
    pub edits_applied: usize,
    /// Edits discarded because they overlapped an earlier one
    pub edits_dropped: usize,
}

impl FixAllOutcome {
    fn unchanged(solution: &Solution) -> Self {
        Self {
            solution: solution.clone(),
            diagnostics: Vec::new(),
            edits_applied: 0,
            edits_dropped: 0,
        }
    }
}

/// Everything the pipeline needs besides the snapshot
pub(crate) struct FixAllPipeline<'a> {
    pub analyzers: &'a [Arc<dyn DiagnosticAnalyzer>],
    pub fixers: &'a FixerRegistry,
    pub toggles: &'a ToggleMap,
    pub options: &'a AnalyzerOptions,
    pub filters: &'a FilterChain,
}

impl FixAllPipeline<'_> {
    /// Analyze and fix one project
    pub fn run_project(
        &self,
        solution: &Solution,
        project_id: ProjectId,
        cache: &mut FilterCache,
        cancel: &CancellationToken,
    ) -> Result<FixAllOutcome, EngineError> {
        let project = solution
            .project(project_id)
            .ok_or(WorkspaceError::UnknownProject(project_id))?;

        let mut diagnostics = Vec::new();
        for analyzer in self.analyzers {
            if cancel.is_cancelled() {
                return Ok(FixAllOutcome::unchanged(solution));
            }
            let found = analyzer.analyze(solution, project, self.options, cancel);
            log::debug!(
                "{} reported {} diagnostic(s) in {}",
                analyzer.name(),
                found.len(),
                project.name()
            );
            diagnostics.extend(found.into_iter().map(|d| {
                if d.analyzer.is_empty() {
                    d.with_analyzer(analyzer.name())
                } else {
                    d
                }
            }));
        }

        diagnostics.retain(|d| self.toggles.is_enabled(&d.id));
        log::info!(
            "Found {} diagnostic(s) in project {}",
            diagnostics.len(),
            project.name()
        );

        // Resolve before fixing anything so an unknown id leaves the project untouched
        let mut batches: Vec<(usize, Vec<&Diagnostic>)> = Vec::new();
        for diagnostic in &diagnostics {
            let index = self.fixers.resolve(&diagnostic.id).ok_or_else(|| {
                EngineError::UnresolvableDiagnostic {
                    id: diagnostic.id.clone(),
                    project: project.name().to_string(),
                }
            })?;
            match batches.iter_mut().find(|(i, _)| *i == index) {
                Some((_, batch)) => batch.push(diagnostic),
                None => batches.push((index, vec![diagnostic])),
            }
        }

        let mut edits: Vec<TextEdit> = Vec::new();
        for (index, batch) in batches {
            if cancel.is_cancelled() {
                return Ok(FixAllOutcome::unchanged(solution));
            }
            let Some(fixer) = self.fixers.fixer(index) else {
                continue;
            };
            let context = FixAllContext {
                solution,
                project,
                diagnostics: batch,
                cancel,
            };
            let produced = fixer.fix_all(&context).map_err(|e| EngineError::Fix {
                fixer: fixer.name().to_string(),
                message: e.to_string(),
            })?;
            edits.extend(produced);
        }

        edits.retain(|edit| match solution.document(edit.document) {
            Some(document) => self.filters.accepts(document, cache),
            None => false,
        });

        let batch = EditBatch::merge(edits);
        if cancel.is_cancelled() {
            return Ok(FixAllOutcome::unchanged(solution));
        }

        let next = batch.apply(solution)?;
        log::info!(
            "Applied {} edit(s) to {} document(s) in project {}",
            batch.len(),
            batch.documents().count(),
            project.name()
        );

        Ok(FixAllOutcome {
            solution: next,
            diagnostics,
            edits_applied: batch.len(),
            edits_dropped: batch.dropped().len(),
        })
    }
}
