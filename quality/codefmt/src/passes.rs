//! Pass executors and run hooks
//!
//! Passes run strictly in order: syntax, local-semantic, global-semantic.
//! Each pass threads the working snapshot through its rules and returns the
//! last committed snapshot. Cancellation is observed at every rule and
//! document boundary.

use crate::engine::{EngineError, RunTimings};
use crate::filter::{FilterCache, FilterChain};
use crate::options::FormattingOptions;
use crate::rule::{GlobalSemanticRule, LocalSemanticRule, RuleClass, RuleDescriptor, SyntaxRule};
use crate::syntax::SyntaxTree;
use crate::workspace::{Document, DocumentId, ProjectId, Solution, WorkspaceError};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Which documents a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Solution,
    Project(ProjectId),
}

impl Scope {
    /// Document ids in scope of a snapshot, in project order
    pub fn document_ids(&self, solution: &Solution) -> Vec<DocumentId> {
        match self {
            Scope::Solution => solution.document_ids(),
            Scope::Project(id) => solution
                .project(*id)
                .map(|p| p.document_ids().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Project ids in scope of a snapshot
    pub fn project_ids(&self, solution: &Solution) -> Vec<ProjectId> {
        match self {
            Scope::Solution => solution.project_ids(),
            Scope::Project(id) if solution.project(*id).is_some() => vec![*id],
            Scope::Project(_) => Vec::new(),
        }
    }
}

/// Rule instance paired with its descriptor
pub(crate) struct Active<'a, R: ?Sized> {
    pub descriptor: &'a RuleDescriptor,
    pub rule: Box<R>,
}

/// State shared by the passes of one run
pub(crate) struct PassContext<'a> {
    pub filters: &'a FilterChain,
    pub cache: FilterCache,
    pub cancel: &'a CancellationToken,
    pub timings: RunTimings,
    pub verbose: bool,
}

impl<'a> PassContext<'a> {
    pub fn new(filters: &'a FilterChain, cancel: &'a CancellationToken, verbose: bool) -> Self {
        Self {
            filters,
            cache: FilterCache::new(),
            cancel,
            timings: RunTimings::default(),
            verbose,
        }
    }

    fn accepts(&mut self, document: &Document) -> bool {
        self.filters.accepts(document, &mut self.cache)
    }

    fn log_document_time(&self, document: &Document, elapsed: Duration) {
        if self.verbose {
            log::info!("    {} {} seconds", document.name(), elapsed.as_secs_f64());
        }
    }
}

struct SyntaxOutcome {
    id: DocumentId,
    tree: Arc<SyntaxTree>,
    elapsed: Duration,
    rules: Vec<(String, Duration, bool)>,
}

fn run_syntax_rules(
    document: &Document,
    rules: &[Active<'_, dyn SyntaxRule>],
    cancel: &CancellationToken,
) -> Option<SyntaxOutcome> {
    if cancel.is_cancelled() {
        return None;
    }

    let start = Instant::now();
    let language = document.language();
    let mut tree = Arc::clone(document.tree());
    let mut timings = Vec::new();

    for active in rules {
        if !active.descriptor.supports_language(language) {
            continue;
        }
        let rule_start = Instant::now();
        let next = active.rule.process(&tree, language);
        let changed = !Arc::ptr_eq(&next, &tree);
        timings.push((active.descriptor.name.clone(), rule_start.elapsed(), changed));
        tree = next;
    }

    Some(SyntaxOutcome {
        id: document.id(),
        tree,
        elapsed: start.elapsed(),
        rules: timings,
    })
}

/// Thread each eligible document through every syntax rule
///
/// Trees may be computed on `pool`; commits always happen in document order.
pub(crate) fn syntax_pass(
    ctx: &mut PassContext<'_>,
    solution: Solution,
    scope: Scope,
    rules: &[Active<'_, dyn SyntaxRule>],
    pool: Option<&rayon::ThreadPool>,
) -> Result<Solution, EngineError> {
    log::info!("Syntax Pass");
    if rules.is_empty() {
        return Ok(solution);
    }

    let mut documents = Vec::new();
    for id in scope.document_ids(&solution) {
        if let Some(document) = solution.document(id) {
            if ctx.accepts(document) {
                documents.push(Arc::clone(document));
            }
        }
    }

    let cancel = ctx.cancel;
    let outcomes: Vec<Option<SyntaxOutcome>> = match pool {
        Some(pool) => pool.install(|| {
            documents
                .par_iter()
                .map(|d| run_syntax_rules(d, rules, cancel))
                .collect()
        }),
        None => documents
            .iter()
            .map(|d| run_syntax_rules(d, rules, cancel))
            .collect(),
    };

    let mut solution = solution;
    for (document, outcome) in documents.iter().zip(outcomes) {
        let Some(outcome) = outcome else {
            continue;
        };
        for (rule, elapsed, changed) in &outcome.rules {
            ctx.timings.record_rule(rule, *elapsed, *changed);
        }
        ctx.timings
            .record_document(document.name(), RuleClass::Syntax, outcome.elapsed);
        ctx.log_document_time(document, outcome.elapsed);

        if !Arc::ptr_eq(&outcome.tree, document.tree()) {
            solution = solution.with_document_tree(outcome.id, outcome.tree)?;
        }
    }

    Ok(solution)
}

/// Rule-major, document-minor pass committing after every document
pub(crate) fn local_semantic_pass(
    ctx: &mut PassContext<'_>,
    solution: Solution,
    scope: Scope,
    rules: &[Active<'_, dyn LocalSemanticRule>],
) -> Result<Solution, EngineError> {
    log::info!("Local Semantic Pass");
    let ids = scope.document_ids(&solution);
    let mut solution = solution;

    for active in rules {
        if ctx.cancel.is_cancelled() {
            return Ok(solution);
        }

        for id in &ids {
            if ctx.cancel.is_cancelled() {
                return Ok(solution);
            }
            let Some(document) = solution.document(*id).cloned() else {
                continue;
            };
            if !ctx.accepts(&document) || !active.descriptor.supports_language(document.language()) {
                continue;
            }

            let start = Instant::now();
            let tree = active
                .rule
                .process(&document, document.tree(), ctx.cancel)
                .map_err(|source| EngineError::Rule {
                    rule: active.descriptor.name.clone(),
                    document: document.name().to_string(),
                    source,
                })?;
            let elapsed = start.elapsed();
            let changed = !Arc::ptr_eq(&tree, document.tree());
            ctx.timings
                .record_rule(&active.descriptor.name, elapsed, changed);
            ctx.timings
                .record_document(document.name(), RuleClass::LocalSemantic, elapsed);
            ctx.log_document_time(&document, elapsed);

            if changed {
                solution = solution.with_document_tree(*id, tree)?;
            }
        }
    }

    Ok(solution)
}

/// Rule-major pass over the current snapshot's documents
///
/// The document list is re-read from the working snapshot for every rule, so
/// documents added by an earlier rule are visited by later ones.
pub(crate) fn global_semantic_pass(
    ctx: &mut PassContext<'_>,
    solution: Solution,
    scope: Scope,
    rules: &[Active<'_, dyn GlobalSemanticRule>],
) -> Result<Solution, EngineError> {
    log::info!("Global Semantic Pass");
    let mut solution = solution;

    for active in rules {
        if ctx.cancel.is_cancelled() {
            return Ok(solution);
        }

        for id in scope.document_ids(&solution) {
            if ctx.cancel.is_cancelled() {
                return Ok(solution);
            }
            let Some(document) = solution.document(id).cloned() else {
                continue;
            };
            if !ctx.accepts(&document) || !active.descriptor.supports_language(document.language()) {
                continue;
            }

            let start = Instant::now();
            let next = active
                .rule
                .process(&solution, &document, document.tree(), ctx.cancel)
                .map_err(|source| EngineError::Rule {
                    rule: active.descriptor.name.clone(),
                    document: document.name().to_string(),
                    source,
                })?;
            let elapsed = start.elapsed();
            let changed = !next.changed_documents(&solution).is_empty()
                || !next.removed_documents(&solution).is_empty();
            ctx.timings
                .record_rule(&active.descriptor.name, elapsed, changed);
            ctx.timings
                .record_document(document.name(), RuleClass::GlobalSemantic, elapsed);
            ctx.log_document_time(&document, elapsed);

            solution = next;
        }
    }

    Ok(solution)
}

/// Define the run's transient preprocessor symbols in every project
pub(crate) fn before_run(
    solution: &Solution,
    options: &FormattingOptions,
) -> Result<Solution, WorkspaceError> {
    let symbols = options.transient_symbols();
    if symbols.is_empty() {
        return Ok(solution.clone());
    }

    let mut next = solution.clone();
    for id in solution.project_ids() {
        if let Some(project) = solution.project(id) {
            let parse_options = project.parse_options().with_symbols(symbols.iter().cloned());
            next = next.with_parse_options(id, parse_options)?;
        }
    }
    Ok(next)
}

/// Restore parse options changed by [`before_run`]
///
/// Projects that existed before the run get their original options back;
/// projects created during the run lose the transient symbols.
pub(crate) fn after_run(
    solution: &Solution,
    original: &Solution,
    options: &FormattingOptions,
) -> Result<Solution, WorkspaceError> {
    let symbols = options.transient_symbols();
    if symbols.is_empty() {
        return Ok(solution.clone());
    }

    let mut next = solution.clone();
    for id in solution.project_ids() {
        let Some(project) = solution.project(id) else {
            continue;
        };
        let restored = match original.project(id) {
            Some(before) => before.parse_options().clone(),
            None => {
                let mut parse_options = project.parse_options().clone();
                parse_options
                    .preprocessor_symbols
                    .retain(|s| !symbols.contains(s));
                parse_options
            }
        };
        next = next.with_parse_options(id, restored)?;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FORMATTER_SYMBOL;
    use crate::plugins::text::TextProvider;
    use crate::syntax::{Language, ParseOptions};

    fn solution() -> (Solution, ProjectId, DocumentId) {
        let (s, p) = Solution::new(Arc::new(TextProvider::new())).add_project(
            "P",
            Language::CSharp,
            ParseOptions::new(&["DEBUG"]),
        );
        let (s, d) = s
            .add_document(p, "A.cs", None, "#if !CODE_FORMATTER\nusing A;\n#endif\n")
            .unwrap();
        (s, p, d)
    }

    #[test]
    fn test_scope_document_ids() {
        let (s, p, d) = solution();
        let (s, q) = s.add_project("Q", Language::CSharp, ParseOptions::default());
        let (s, e) = s.add_document(q, "B.cs", None, "").unwrap();
        assert_eq!(Scope::Solution.document_ids(&s), vec![d, e]);
        assert_eq!(Scope::Project(p).document_ids(&s), vec![d]);
        assert_eq!(Scope::Project(q).project_ids(&s), vec![q]);
    }

    #[test]
    fn test_hooks_round_trip_parse_options() {
        let (s, p, d) = solution();
        let options = FormattingOptions::new().with_allow_tables(true);

        let during = before_run(&s, &options).unwrap();
        assert!(during.project(p).unwrap().parse_options().is_defined(FORMATTER_SYMBOL));
        assert!(during.document(d).unwrap().tree().is_line_disabled(1));

        let after = after_run(&during, &s, &options).unwrap();
        assert_eq!(
            after.project(p).unwrap().parse_options(),
            &ParseOptions::new(&["DEBUG"])
        );
        assert!(!after.document(d).unwrap().tree().is_line_disabled(1));
    }

    #[test]
    fn test_after_run_strips_symbols_from_new_projects() {
        let (s, _, _) = solution();
        let options = FormattingOptions::new().with_allow_tables(true);
        let during = before_run(&s, &options).unwrap();
        let (during, q) = during.add_project(
            "New",
            Language::CSharp,
            ParseOptions::new(&[FORMATTER_SYMBOL, "X"]),
        );

        let after = after_run(&during, &s, &options).unwrap();
        assert_eq!(
            after.project(q).unwrap().parse_options(),
            &ParseOptions::new(&["X"])
        );
    }

    #[test]
    fn test_hooks_are_noops_without_symbols() {
        let (s, p, _) = solution();
        let options = FormattingOptions::new();
        let during = before_run(&s, &options).unwrap();
        assert_eq!(
            during.project(p).unwrap().parse_options(),
            s.project(p).unwrap().parse_options()
        );
    }
}
