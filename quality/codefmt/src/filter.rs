//! Document filters deciding which documents take part in a run

use crate::workspace::{Document, DocumentId};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Verdict of a single filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Document participates
    Process,
    /// Document is silently left out
    Exclude,
    /// Document is left out and the user is warned
    Skip(String),
}

/// A predicate over documents
pub trait DocumentFilter: Send + Sync {
    /// Filter name used in debug logs
    fn name(&self) -> &str;

    /// Decide whether a document participates in the run
    fn decide(&self, document: &Document) -> FilterDecision;

    /// Convenience boolean form of [`DocumentFilter::decide`]
    fn should_process(&self, document: &Document) -> bool {
        self.decide(document) == FilterDecision::Process
    }
}

/// A file-backed document must exist and be writable
#[derive(Debug, Default)]
pub struct UsableFileFilter;

impl DocumentFilter for UsableFileFilter {
    fn name(&self) -> &str {
        "usable-file"
    }

    fn decide(&self, document: &Document) -> FilterDecision {
        let Some(path) = document.path() else {
            return FilterDecision::Process;
        };

        match std::fs::metadata(path) {
            Err(_) => FilterDecision::Skip("does not exist".to_string()),
            Ok(meta) if meta.permissions().readonly() => {
                FilterDecision::Skip("is read-only".to_string())
            }
            Ok(_) => FilterDecision::Process,
        }
    }
}

/// Accept only documents whose file name is on an allow-list
#[derive(Debug, Default)]
pub struct FileNameFilter {
    names: Vec<String>,
}

impl FileNameFilter {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

impl DocumentFilter for FileNameFilter {
    fn name(&self) -> &str {
        "file-name"
    }

    fn decide(&self, document: &Document) -> FilterDecision {
        if self.names.is_empty() {
            return FilterDecision::Process;
        }

        let file_name = document
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| document.name().to_lowercase());

        if self.names.iter().any(|n| *n == file_name) {
            FilterDecision::Process
        } else {
            FilterDecision::Exclude
        }
    }
}

/// Leave out documents whose path matches an exclude glob
#[derive(Debug)]
pub struct ExcludeFilter {
    set: GlobSet,
}

impl ExcludeFilter {
    /// Build from glob patterns, returning the first invalid pattern on error
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }
}

impl DocumentFilter for ExcludeFilter {
    fn name(&self) -> &str {
        "exclude"
    }

    fn decide(&self, document: &Document) -> FilterDecision {
        match document.path() {
            Some(path) if self.set.is_match(path) => FilterDecision::Exclude,
            _ => FilterDecision::Process,
        }
    }
}

/// A document a filter warned about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Verdicts memoized for the duration of one run
#[derive(Debug, Default)]
pub struct FilterCache {
    verdicts: HashMap<DocumentId, bool>,
    skipped: Vec<SkippedDocument>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents skipped with a warning, in first-seen order
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedDocument> {
        self.skipped
    }
}

/// Ordered AND of filters
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn DocumentFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter (evaluated after the existing ones)
    pub fn push(&mut self, filter: Box<dyn DocumentFilter>) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: impl DocumentFilter + 'static) -> Self {
        self.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluate the chain, stopping at the first filter that rejects
    pub fn decide(&self, document: &Document) -> FilterDecision {
        for filter in &self.filters {
            let decision = filter.decide(document);
            if decision != FilterDecision::Process {
                log::debug!("{} rejected by {} filter", document.name(), filter.name());
                return decision;
            }
        }
        FilterDecision::Process
    }

    /// Memoized check; warns once per rejected document
    pub fn accepts(&self, document: &Document, cache: &mut FilterCache) -> bool {
        if let Some(verdict) = cache.verdicts.get(&document.id()) {
            return *verdict;
        }

        let verdict = match self.decide(document) {
            FilterDecision::Process => true,
            FilterDecision::Exclude => false,
            FilterDecision::Skip(reason) => {
                let path = document
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from(document.name()));
                log::warn!(
                    "skipping document '{}' because it {}",
                    path.display(),
                    reason
                );
                cache.skipped.push(SkippedDocument { path, reason });
                false
            }
        };

        cache.verdicts.insert(document.id(), verdict);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::text::TextProvider;
    use crate::syntax::{Language, ParseOptions};
    use crate::workspace::Solution;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn solution_with(paths: &[Option<PathBuf>]) -> (Solution, Vec<DocumentId>) {
        let (mut s, p) = Solution::new(Arc::new(TextProvider::new())).add_project(
            "P",
            Language::CSharp,
            ParseOptions::default(),
        );
        let mut ids = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            let name = path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("Doc{}.cs", i));
            let (next, id) = s.add_document(p, &name, path.clone(), "").unwrap();
            s = next;
            ids.push(id);
        }
        (s, ids)
    }

    #[test]
    fn test_usable_file_filter() {
        let dir = TempDir::new().unwrap();
        let writable = dir.path().join("A.cs");
        let readonly = dir.path().join("B.cs");
        std::fs::write(&writable, "").unwrap();
        std::fs::write(&readonly, "").unwrap();
        let mut perms = std::fs::metadata(&readonly).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&readonly, perms).unwrap();

        let (s, ids) = solution_with(&[
            Some(writable),
            Some(readonly),
            Some(dir.path().join("Missing.cs")),
            None,
        ]);
        let filter = UsableFileFilter;
        let decide = |i: usize| filter.decide(s.document(ids[i]).unwrap());
        assert_eq!(decide(0), FilterDecision::Process);
        assert_eq!(decide(1), FilterDecision::Skip("is read-only".to_string()));
        assert_eq!(decide(2), FilterDecision::Skip("does not exist".to_string()));
        assert_eq!(decide(3), FilterDecision::Process);
    }

    #[test]
    fn test_file_name_filter_case_insensitive() {
        let (s, ids) = solution_with(&[
            Some(PathBuf::from("/src/Program.cs")),
            Some(PathBuf::from("/src/Other.cs")),
        ]);
        let filter = FileNameFilter::new(&["program.CS".to_string()]);
        assert!(filter.should_process(s.document(ids[0]).unwrap()));
        assert!(!filter.should_process(s.document(ids[1]).unwrap()));

        let empty = FileNameFilter::new(&[]);
        assert!(empty.should_process(s.document(ids[1]).unwrap()));
    }

    #[test]
    fn test_exclude_filter() {
        let (s, ids) = solution_with(&[
            Some(PathBuf::from("src/generated/A.cs")),
            Some(PathBuf::from("src/B.cs")),
        ]);
        let filter = ExcludeFilter::new(&["**/generated/**".to_string()]).unwrap();
        assert!(!filter.should_process(s.document(ids[0]).unwrap()));
        assert!(filter.should_process(s.document(ids[1]).unwrap()));
        assert!(ExcludeFilter::new(&["a/[".to_string()]).is_err());
    }

    #[test]
    fn test_chain_warns_once_per_document() {
        let dir = TempDir::new().unwrap();
        let (s, ids) = solution_with(&[Some(dir.path().join("Gone.cs"))]);
        let chain = FilterChain::new().with(UsableFileFilter);
        let mut cache = FilterCache::new();
        let doc = s.document(ids[0]).unwrap();

        assert!(!chain.accepts(doc, &mut cache));
        assert!(!chain.accepts(doc, &mut cache));
        assert_eq!(cache.skipped().len(), 1);
        assert_eq!(cache.skipped()[0].reason, "does not exist");
    }

    #[test]
    fn test_chain_short_circuits_in_order() {
        let dir = TempDir::new().unwrap();
        let (s, ids) = solution_with(&[Some(dir.path().join("Gone.cs"))]);
        let chain = FilterChain::new()
            .with(FileNameFilter::new(&["Other.cs".to_string()]))
            .with(UsableFileFilter);
        let mut cache = FilterCache::new();

        assert!(!chain.accepts(s.document(ids[0]).unwrap(), &mut cache));
        assert!(cache.skipped().is_empty());
    }
}
