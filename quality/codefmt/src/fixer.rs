//! Code fixers and batched text edits
//!
//! A fixer turns all diagnostics of one id within a project into text edits.
//! Edits from every fixer are merged into one [`EditBatch`]; overlapping edits
//! are dropped first-wins, and the batch is applied in a single commit.

use crate::diagnostic::Diagnostic;
use crate::workspace::{DocumentId, Project, Solution, WorkspaceError};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure inside a fixer
#[derive(Debug, Error)]
pub enum FixError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// A replacement of a byte span in a document's full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub document: DocumentId,
    pub span: Range<usize>,
    pub new_text: String,
}

impl TextEdit {
    pub fn replace(document: DocumentId, span: Range<usize>, new_text: &str) -> Self {
        Self {
            document,
            span,
            new_text: new_text.to_string(),
        }
    }

    pub fn delete(document: DocumentId, span: Range<usize>) -> Self {
        Self::replace(document, span, "")
    }

    /// Two edits overlap when their spans intersect, or both insert at one point
    pub fn overlaps(&self, other: &TextEdit) -> bool {
        if self.document != other.document {
            return false;
        }
        if self.span.is_empty() && other.span.is_empty() {
            return self.span.start == other.span.start;
        }
        self.span.start < other.span.end && other.span.start < self.span.end
    }
}

/// Everything a fixer sees for one batched fix-all call
pub struct FixAllContext<'a> {
    pub solution: &'a Solution,
    pub project: &'a Project,
    /// Diagnostics of this fixer's ids, in report order
    pub diagnostics: Vec<&'a Diagnostic>,
    pub cancel: &'a CancellationToken,
}

/// Produces edits for a batch of diagnostics
pub trait CodeFixer: Send + Sync {
    /// Fixer name used in errors and logs
    fn name(&self) -> &str;

    /// Diagnostic ids this fixer handles
    fn fixable_ids(&self) -> Vec<String>;

    /// Compute edits for every diagnostic in the context
    fn fix_all(&self, context: &FixAllContext<'_>) -> Result<Vec<TextEdit>, FixError>;
}

/// Two fixers claim the same diagnostic id
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Diagnostic '{id}' is fixed by both '{first}' and '{second}'")]
pub struct DuplicateFixer {
    pub id: String,
    pub first: String,
    pub second: String,
}

/// Diagnostic id -> fixer map
#[derive(Clone, Default)]
pub struct FixerRegistry {
    fixers: Vec<Arc<dyn CodeFixer>>,
    by_id: HashMap<String, usize>,
}

impl FixerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixer; every id may be claimed only once
    pub fn register(&mut self, fixer: Arc<dyn CodeFixer>) -> Result<(), DuplicateFixer> {
        let ids = fixer.fixable_ids();
        for id in &ids {
            if let Some(existing) = self.by_id.get(id) {
                return Err(DuplicateFixer {
                    id: id.clone(),
                    first: self.fixers[*existing].name().to_string(),
                    second: fixer.name().to_string(),
                });
            }
        }

        let index = self.fixers.len();
        self.fixers.push(fixer);
        for id in ids {
            self.by_id.insert(id, index);
        }
        Ok(())
    }

    /// Fixer index for a diagnostic id
    pub fn resolve(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn fixer(&self, index: usize) -> Option<&Arc<dyn CodeFixer>> {
        self.fixers.get(index)
    }

    pub fn fixers(&self) -> &[Arc<dyn CodeFixer>] {
        &self.fixers
    }

    pub fn is_empty(&self) -> bool {
        self.fixers.is_empty()
    }
}

/// Merged, non-overlapping edits grouped by document
#[derive(Debug, Clone, Default)]
pub struct EditBatch {
    edits: BTreeMap<DocumentId, Vec<TextEdit>>,
    dropped: Vec<TextEdit>,
}

impl EditBatch {
    /// Merge edits in arrival order; an edit overlapping an accepted one is dropped
    pub fn merge(edits: impl IntoIterator<Item = TextEdit>) -> Self {
        let mut batch = Self::default();
        for edit in edits {
            let accepted = batch.edits.entry(edit.document).or_default();
            if accepted.iter().any(|e| e.overlaps(&edit)) {
                log::debug!(
                    "Dropping edit {:?} in {}: overlaps an earlier edit",
                    edit.span,
                    edit.document
                );
                batch.dropped.push(edit);
            } else {
                accepted.push(edit);
            }
        }
        for edits in batch.edits.values_mut() {
            edits.sort_by_key(|e| (e.span.start, e.span.end));
        }
        batch.edits.retain(|_, edits| !edits.is_empty());
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Number of accepted edits
    pub fn len(&self) -> usize {
        self.edits.values().map(|e| e.len()).sum()
    }

    pub fn documents(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.edits.keys().copied()
    }

    /// Edits dropped because they overlapped
    pub fn dropped(&self) -> &[TextEdit] {
        &self.dropped
    }

    /// Apply every edit, re-parsing each touched document once
    pub fn apply(&self, solution: &Solution) -> Result<Solution, WorkspaceError> {
        let mut next = solution.clone();
        for (id, edits) in &self.edits {
            let document = solution
                .document(*id)
                .ok_or(WorkspaceError::UnknownDocument(*id))?;
            let text = apply_edits(&document.text(), edits);
            next = next.with_document_text(*id, &text)?;
        }
        Ok(next)
    }
}

/// Apply sorted, non-overlapping edits to a text
///
/// Spans beyond the text or not on a char boundary are skipped.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        let Range { start, end } = edit.span;
        if start < cursor
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            log::debug!("Skipping out-of-range edit {:?}", edit.span);
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(&edit.new_text);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Generate a unified diff between two texts (one hunk, three context lines)
pub fn generate_unified_diff(file: &Path, original: &str, modified: &str) -> String {
    const CONTEXT: usize = 3;

    let original_lines: Vec<&str> = original.lines().collect();
    let modified_lines: Vec<&str> = modified.lines().collect();
    if original_lines == modified_lines {
        return String::new();
    }

    let prefix = original_lines
        .iter()
        .zip(&modified_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = original_lines.len().min(modified_lines.len()) - prefix;
    let suffix = original_lines
        .iter()
        .rev()
        .zip(modified_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let start = prefix.saturating_sub(CONTEXT);
    let orig_end = (original_lines.len() - suffix + CONTEXT).min(original_lines.len());
    let mod_end = (modified_lines.len() - suffix + CONTEXT).min(modified_lines.len());

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", file.display()));
    diff.push_str(&format!("+++ b/{}\n", file.display()));
    diff.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        start + 1,
        orig_end - start,
        start + 1,
        mod_end - start
    ));

    for line in &original_lines[start..prefix] {
        diff.push_str(&format!(" {}\n", line));
    }
    for line in &original_lines[prefix..original_lines.len() - suffix] {
        diff.push_str(&format!("-{}\n", line));
    }
    for line in &modified_lines[prefix..modified_lines.len() - suffix] {
        diff.push_str(&format!("+{}\n", line));
    }
    for line in &original_lines[original_lines.len() - suffix..orig_end] {
        diff.push_str(&format!(" {}\n", line));
    }

    diff
}
