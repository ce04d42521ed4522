//! Immutable solution snapshots and the workspace that persists them
//!
//! Every edit on a [`Solution`] returns a new snapshot. Unchanged documents
//! and projects are shared between snapshots through `Arc`.

use crate::provider::AnalysisProvider;
use crate::semantic::SemanticModel;
use crate::syntax::{Language, ParseOptions, SyntaxTree};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Error raised by snapshot edits or while persisting changes
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("Unknown project: {0}")]
    UnknownProject(ProjectId),

    /// `written` lists the files persisted before the failure
    #[error("Failed to write {path}: {source} ({} file(s) already written)", .written.len())]
    Write {
        path: PathBuf,
        written: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

/// Stable document identifier within a solution lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u32);

/// Stable project identifier within a solution lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project#{}", self.0)
    }
}

/// A source file inside a project
///
/// The semantic model is computed on first request and cached on this
/// instance. Replacing the tree produces a new `Document`, so a cached model
/// always describes `tree`.
pub struct Document {
    id: DocumentId,
    project_id: ProjectId,
    name: String,
    path: Option<PathBuf>,
    tree: Arc<SyntaxTree>,
    provider: Arc<dyn AnalysisProvider>,
    semantic: OnceLock<Arc<dyn SemanticModel>>,
}

impl Document {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Display name (file name for file-backed documents)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn language(&self) -> Language {
        self.tree.language()
    }

    pub fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    pub fn text(&self) -> String {
        self.tree.full_text()
    }

    /// Semantic model of the current tree (computed once per instance)
    pub fn semantic_model(&self) -> Arc<dyn SemanticModel> {
        Arc::clone(
            self.semantic
                .get_or_init(|| self.provider.semantic_model(&self.tree)),
        )
    }

    fn with_tree(&self, tree: Arc<SyntaxTree>) -> Document {
        Document {
            id: self.id,
            project_id: self.project_id,
            name: self.name.clone(),
            path: self.path.clone(),
            tree,
            provider: Arc::clone(&self.provider),
            semantic: OnceLock::new(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("language", &self.language())
            .finish()
    }
}

/// A set of documents sharing language and parse options
#[derive(Debug, Clone)]
pub struct Project {
    id: ProjectId,
    name: String,
    language: Language,
    parse_options: ParseOptions,
    document_ids: Vec<DocumentId>,
}

impl Project {
    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse_options
    }

    /// Document ids in project order
    pub fn document_ids(&self) -> &[DocumentId] {
        &self.document_ids
    }
}

/// Immutable snapshot of projects and their documents
#[derive(Clone)]
pub struct Solution {
    provider: Arc<dyn AnalysisProvider>,
    projects: BTreeMap<ProjectId, Arc<Project>>,
    documents: BTreeMap<DocumentId, Arc<Document>>,
    next_id: u32,
}

impl Solution {
    /// Create an empty solution backed by a provider
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            provider,
            projects: BTreeMap::new(),
            documents: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn provider(&self) -> &Arc<dyn AnalysisProvider> {
        &self.provider
    }

    /// Projects in creation order
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values().map(|p| p.as_ref())
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.projects.keys().copied().collect()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id).map(|p| p.as_ref())
    }

    /// Find a project by name
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects().find(|p| p.name == name)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.documents.get(&id)
    }

    /// All document ids, project by project, in project order
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.projects()
            .flat_map(|p| p.document_ids.iter().copied())
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Find a document by its backing path
    pub fn document_by_path(&self, path: &Path) -> Option<&Arc<Document>> {
        self.documents.values().find(|d| d.path() == Some(path))
    }

    /// Add an empty project
    pub fn add_project(
        &self,
        name: &str,
        language: Language,
        parse_options: ParseOptions,
    ) -> (Solution, ProjectId) {
        let mut next = self.clone();
        let id = ProjectId(next.allocate_id());
        next.projects.insert(
            id,
            Arc::new(Project {
                id,
                name: name.to_string(),
                language,
                parse_options,
                document_ids: Vec::new(),
            }),
        );
        (next, id)
    }

    /// Parse `text` and add it as a new document of `project_id`
    pub fn add_document(
        &self,
        project_id: ProjectId,
        name: &str,
        path: Option<PathBuf>,
        text: &str,
    ) -> Result<(Solution, DocumentId), WorkspaceError> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or(WorkspaceError::UnknownProject(project_id))?;
        let tree = self
            .provider
            .parse(text, project.language, &project.parse_options);

        let mut next = self.clone();
        let id = DocumentId(next.allocate_id());
        let mut project = Project::clone(project);
        project.document_ids.push(id);
        next.projects.insert(project_id, Arc::new(project));
        next.documents.insert(
            id,
            Arc::new(Document {
                id,
                project_id,
                name: name.to_string(),
                path,
                tree,
                provider: Arc::clone(&self.provider),
                semantic: OnceLock::new(),
            }),
        );
        Ok((next, id))
    }

    /// Remove a document from its project
    pub fn remove_document(&self, id: DocumentId) -> Result<Solution, WorkspaceError> {
        let document = self
            .documents
            .get(&id)
            .ok_or(WorkspaceError::UnknownDocument(id))?;
        let project_id = document.project_id;

        let mut next = self.clone();
        next.documents.remove(&id);
        if let Some(project) = self.projects.get(&project_id) {
            let mut project = Project::clone(project);
            project.document_ids.retain(|d| *d != id);
            next.projects.insert(project_id, Arc::new(project));
        }
        Ok(next)
    }

    /// Replace a document's tree
    ///
    /// Passing the document's current tree (same `Arc`) returns an identical
    /// snapshot without allocating a new document.
    pub fn with_document_tree(
        &self,
        id: DocumentId,
        tree: Arc<SyntaxTree>,
    ) -> Result<Solution, WorkspaceError> {
        let document = self
            .documents
            .get(&id)
            .ok_or(WorkspaceError::UnknownDocument(id))?;
        if Arc::ptr_eq(&document.tree, &tree) {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        next.documents.insert(id, Arc::new(document.with_tree(tree)));
        Ok(next)
    }

    /// Replace a document's text, re-parsing it under its project's options
    pub fn with_document_text(
        &self,
        id: DocumentId,
        text: &str,
    ) -> Result<Solution, WorkspaceError> {
        let document = self
            .documents
            .get(&id)
            .ok_or(WorkspaceError::UnknownDocument(id))?;
        let project = self
            .projects
            .get(&document.project_id)
            .ok_or(WorkspaceError::UnknownProject(document.project_id))?;
        let tree = self
            .provider
            .parse(text, project.language, &project.parse_options);
        self.with_document_tree(id, tree)
    }

    /// Change a project's parse options and re-parse its documents
    pub fn with_parse_options(
        &self,
        project_id: ProjectId,
        parse_options: ParseOptions,
    ) -> Result<Solution, WorkspaceError> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or(WorkspaceError::UnknownProject(project_id))?;
        if project.parse_options == parse_options {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        for doc_id in &project.document_ids {
            if let Some(document) = self.documents.get(doc_id) {
                let tree =
                    self.provider
                        .parse(&document.text(), project.language, &parse_options);
                next.documents
                    .insert(*doc_id, Arc::new(document.with_tree(tree)));
            }
        }

        let mut project = Project::clone(project);
        project.parse_options = parse_options;
        next.projects.insert(project_id, Arc::new(project));
        Ok(next)
    }

    /// Documents whose tree differs (by identity) from `baseline`, plus added ones
    pub fn changed_documents(&self, baseline: &Solution) -> Vec<DocumentId> {
        self.documents
            .iter()
            .filter(|(id, doc)| match baseline.documents.get(id) {
                Some(old) => !Arc::ptr_eq(&old.tree, &doc.tree),
                None => true,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Documents present in `baseline` but missing here
    pub fn removed_documents(&self, baseline: &Solution) -> Vec<DocumentId> {
        baseline
            .documents
            .keys()
            .filter(|id| !self.documents.contains_key(id))
            .copied()
            .collect()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("provider", &self.provider.id())
            .field("projects", &self.projects.len())
            .field("documents", &self.documents.len())
            .finish()
    }
}

/// A document written (or that would be written) by [`Workspace::try_apply_changes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub path: PathBuf,
    pub old_text: String,
    pub new_text: String,
}

/// Outcome of persisting a snapshot
#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    /// Files whose text changed, in document order
    pub changes: Vec<AppliedChange>,
    /// Paths of documents the run removed (never deleted from disk)
    pub removed: Vec<PathBuf>,
    /// Nothing was written
    pub dry_run: bool,
}

impl ApplySummary {
    pub fn changed_paths(&self) -> Vec<&Path> {
        self.changes.iter().map(|c| c.path.as_path()).collect()
    }
}

/// Holds the loaded snapshot and persists later snapshots to disk
#[derive(Debug, Clone)]
pub struct Workspace {
    current: Solution,
    dry_run: bool,
}

impl Workspace {
    pub fn new(solution: Solution) -> Self {
        Self {
            current: solution,
            dry_run: false,
        }
    }

    /// Report changes without writing files
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn current_solution(&self) -> &Solution {
        &self.current
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Persist `solution` relative to the current snapshot
    ///
    /// Documents whose tree identity changed are written only if their text
    /// differs. Documents without a backing path stay in memory. All changes
    /// are computed before the first write; if a write fails, the error lists
    /// the files already written and the current snapshot is left unchanged.
    pub fn try_apply_changes(&mut self, solution: Solution) -> Result<ApplySummary, WorkspaceError> {
        let mut summary = ApplySummary {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for id in solution.changed_documents(&self.current) {
            let Some(document) = solution.document(id) else {
                continue;
            };
            let Some(path) = document.path() else {
                continue;
            };

            let previous = self.current.document(id);
            let old_text = previous.map(|d| d.text()).unwrap_or_default();
            let new_text = document.text();
            if previous.is_some() && old_text == new_text {
                continue;
            }

            summary.changes.push(AppliedChange {
                path: path.to_path_buf(),
                old_text,
                new_text,
            });
        }

        for id in solution.removed_documents(&self.current) {
            if let Some(path) = self.current.document(id).and_then(|d| d.path()) {
                log::warn!(
                    "document '{}' was removed from the solution; leaving the file in place",
                    path.display()
                );
                summary.removed.push(path.to_path_buf());
            }
        }

        if !self.dry_run {
            write_all(&summary.changes)?;
        }

        self.current = solution;
        Ok(summary)
    }
}

fn write_all(changes: &[AppliedChange]) -> Result<(), WorkspaceError> {
    let mut written = Vec::with_capacity(changes.len());
    for change in changes {
        if let Err(source) = std::fs::write(&change.path, &change.new_text) {
            if !written.is_empty() {
                log::error!(
                    "write of '{}' failed after {} file(s) were written",
                    change.path.display(),
                    written.len()
                );
            }
            return Err(WorkspaceError::Write {
                path: change.path.clone(),
                written,
                source,
            });
        }
        log::debug!("Wrote {}", change.path.display());
        written.push(change.path.clone());
    }
    Ok(())
}
