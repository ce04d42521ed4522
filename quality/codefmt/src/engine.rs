//! Formatting engine façade
//!
//! The engine owns the rule catalog, analyzers, fixers, filter chain and the
//! two toggle maps. A run takes a solution snapshot and returns a new one in
//! a [`RunReport`]; the input snapshot is never modified.

use crate::analyzer::{AnalyzerOptions, DiagnosticAnalyzer};
use crate::config::EngineConfig;
use crate::diagnostic::{Diagnostic, DiagnosticDescriptor};
use crate::filter::{ExcludeFilter, FileNameFilter, FilterChain, SkippedDocument, UsableFileFilter};
use crate::fix_all::FixAllPipeline;
use crate::fixer::{CodeFixer, DuplicateFixer, FixerRegistry};
use crate::options::{FormatMode, FormattingOptions};
use crate::passes::{self, Active, PassContext, Scope};
use crate::rule::{
    CatalogError, FormattingRule, GlobalSemanticRule, LocalSemanticRule, RuleCatalog, RuleClass,
    RuleDescriptor, RuleError, SyntaxRule, ToggleMap,
};
use crate::workspace::{ApplySummary, ProjectId, Solution, Workspace, WorkspaceError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Engine error
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Could not find rule with name {0}")]
    RuleNotFound(String),

    #[error("Could not find diagnostic with id {0}")]
    DiagnosticNotFound(String),

    #[error("Duplicate rule name: {0}")]
    DuplicateRule(String),

    #[error(transparent)]
    DuplicateFixer(#[from] DuplicateFixer),

    #[error("Rule '{rule}' is registered as {expected} but builds a {actual} rule")]
    RuleClassMismatch {
        rule: String,
        expected: RuleClass,
        actual: RuleClass,
    },

    #[error("No fixer handles diagnostic '{id}' reported in project '{project}'")]
    UnresolvableDiagnostic { id: String, project: String },

    #[error("Rule '{rule}' failed on '{document}': {source}")]
    Rule {
        rule: String,
        document: String,
        #[source]
        source: RuleError,
    },

    #[error("Fixer '{fixer}' failed: {message}")]
    Fix { fixer: String, message: String },

    #[error("Invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("{}", .messages.join("\n"))]
    Host { messages: Vec<String> },
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Duplicate(name) => EngineError::DuplicateRule(name),
        }
    }
}

/// Build a host failure from cause messages, keeping the first of each
pub fn host_failure<I, S>(causes: I) -> EngineError
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut messages: Vec<String> = Vec::new();
    for cause in causes {
        let cause = cause.into();
        if !messages.contains(&cause) {
            messages.push(cause);
        }
    }
    EngineError::Host { messages }
}

/// Per-rule timing statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleTiming {
    /// Rule name
    pub rule: String,
    /// Total time spent in this rule
    pub total_time: Duration,
    /// Number of documents the rule processed
    pub evaluation_count: usize,
    /// Number of documents the rule changed
    pub change_count: usize,
}

impl RuleTiming {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Time spent on one document in one pass
#[derive(Debug, Clone, Serialize)]
pub struct DocumentTiming {
    pub document: String,
    pub pass: RuleClass,
    pub elapsed: Duration,
}

/// Timing collected during a run
#[derive(Debug, Clone, Default)]
pub struct RunTimings {
    pub rules: HashMap<String, RuleTiming>,
    pub documents: Vec<DocumentTiming>,
}

impl RunTimings {
    pub fn record_rule(&mut self, rule: &str, elapsed: Duration, changed: bool) {
        let timing = self
            .rules
            .entry(rule.to_string())
            .or_insert_with(|| RuleTiming::new(rule));
        timing.total_time += elapsed;
        timing.evaluation_count += 1;
        if changed {
            timing.change_count += 1;
        }
    }

    pub fn record_document(&mut self, document: &str, pass: RuleClass, elapsed: Duration) {
        self.documents.push(DocumentTiming {
            document: document.to_string(),
            pass,
            elapsed,
        });
    }

    /// Merge another run's timings into this one
    pub fn merge(&mut self, other: RunTimings) {
        for (rule, timing) in other.rules {
            let entry = self
                .rules
                .entry(rule)
                .or_insert_with(|| RuleTiming::new(&timing.rule));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.change_count += timing.change_count;
        }
        self.documents.extend(other.documents);
    }

    /// Rule timings sorted by total time (descending)
    pub fn sorted_rules(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rules.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time).then(a.rule.cmp(&b.rule)));
        timings
    }

    /// Format timing statistics as a table
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_rules();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>10} {:>10}\n",
            "Rule", "Total", "Avg", "Docs", "Changed"
        ));
        output.push_str(&"-".repeat(88));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;
            output.push_str(&format!(
                "{:<40} {:>10.2}ms {:>10.2}µs {:>10} {:>10}\n",
                timing.rule, total_ms, avg_us, timing.evaluation_count, timing.change_count
            ));
        }

        output
    }
}

/// A project whose fix-all run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFailure {
    pub project: String,
    pub message: String,
}

/// Result of a formatting run
#[derive(Debug)]
pub struct RunReport {
    /// Snapshot after the run (last committed one when cancelled)
    pub solution: Solution,
    pub cancelled: bool,
    pub mode: FormatMode,
    pub timings: RunTimings,
    pub skipped: Vec<SkippedDocument>,
    /// Fix-all failures of individual projects (solution runs only)
    pub failures: Vec<ProjectFailure>,
    /// Enabled diagnostics found in fix-all mode
    pub diagnostics: Vec<Diagnostic>,
    /// Fix-all edits committed across projects
    pub edits_applied: usize,
    /// Fix-all edits discarded because they overlapped an earlier edit
    pub edits_dropped: usize,
    pub duration: Duration,
}

/// Totals gathered by the fix-all pipeline over every project in scope
#[derive(Debug, Default)]
struct FixAllTotals {
    failures: Vec<ProjectFailure>,
    diagnostics: Vec<Diagnostic>,
    edits_applied: usize,
    edits_dropped: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write the resulting snapshot through `workspace`
    ///
    /// A cancelled run writes nothing and leaves the workspace on its
    /// current snapshot.
    pub fn persist(&self, workspace: &mut Workspace) -> Result<ApplySummary, WorkspaceError> {
        if self.cancelled {
            log::warn!("Run was cancelled; no files were written");
            return Ok(ApplySummary {
                dry_run: workspace.is_dry_run(),
                ..Default::default()
            });
        }
        workspace.try_apply_changes(self.solution.clone())
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    options: FormattingOptions,
    config: EngineConfig,
    catalog: RuleCatalog,
    analyzers: Vec<Arc<dyn DiagnosticAnalyzer>>,
    fixers: Vec<Arc<dyn CodeFixer>>,
    filters: Vec<Box<dyn crate::filter::DocumentFilter>>,
    exclude: Vec<String>,
}

impl EngineBuilder {
    pub fn catalog(mut self, catalog: RuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn DiagnosticAnalyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    pub fn fixer(mut self, fixer: Arc<dyn CodeFixer>) -> Self {
        self.fixers.push(fixer);
        self
    }

    /// Append a filter after the built-in ones
    pub fn filter(mut self, filter: impl crate::filter::DocumentFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Glob patterns of paths to leave out
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<Engine, EngineError> {
        let mut fixers = FixerRegistry::new();
        for fixer in self.fixers {
            fixers.register(fixer)?;
        }

        let mut filters = FilterChain::new()
            .with(UsableFileFilter)
            .with(FileNameFilter::new(&self.options.file_names));
        if !self.exclude.is_empty() {
            filters.push(Box::new(ExcludeFilter::new(&self.exclude)?));
        }
        for filter in self.filters {
            filters.push(filter);
        }

        let rule_toggles = ToggleMap::from_catalog(&self.catalog);
        let mut diagnostic_toggles = ToggleMap::new();
        for analyzer in &self.analyzers {
            for descriptor in analyzer.supported_diagnostics() {
                if !diagnostic_toggles.contains(&descriptor.id) {
                    diagnostic_toggles.insert(&descriptor.id, descriptor.enabled_by_default);
                }
            }
        }

        Ok(Engine {
            options: self.options,
            config: self.config,
            catalog: self.catalog,
            rule_toggles,
            analyzers: self.analyzers,
            fixers,
            diagnostic_toggles,
            filters,
        })
    }
}

/// The formatting engine
pub struct Engine {
    options: FormattingOptions,
    config: EngineConfig,
    catalog: RuleCatalog,
    rule_toggles: ToggleMap,
    analyzers: Vec<Arc<dyn DiagnosticAnalyzer>>,
    fixers: FixerRegistry,
    diagnostic_toggles: ToggleMap,
    filters: FilterChain,
}

impl Engine {
    /// Start building an engine for the given run options
    pub fn builder(options: FormattingOptions) -> EngineBuilder {
        EngineBuilder {
            options,
            config: EngineConfig::default(),
            catalog: RuleCatalog::new(),
            analyzers: Vec::new(),
            fixers: Vec::new(),
            filters: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Rule descriptors in registration order
    pub fn rules(&self) -> Vec<&RuleDescriptor> {
        self.catalog.descriptors().collect()
    }

    /// Diagnostics of every analyzer, sorted by id (one entry per id)
    pub fn supported_diagnostics(&self) -> Vec<DiagnosticDescriptor> {
        let mut descriptors: Vec<DiagnosticDescriptor> = Vec::new();
        for analyzer in &self.analyzers {
            for descriptor in analyzer.supported_diagnostics() {
                if !descriptors.iter().any(|d| d.id == descriptor.id) {
                    descriptors.push(descriptor);
                }
            }
        }
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    /// Enable or disable a rule by name (case-insensitive)
    pub fn toggle_rule(&mut self, name: &str, enabled: bool) -> Result<(), EngineError> {
        self.rule_toggles
            .toggle(name, enabled)
            .map_err(|e| EngineError::RuleNotFound(e.0))
    }

    /// Enable or disable a diagnostic by id (case-insensitive)
    pub fn toggle_diagnostic(&mut self, id: &str, enabled: bool) -> Result<(), EngineError> {
        self.diagnostic_toggles
            .toggle(id, enabled)
            .map_err(|e| EngineError::DiagnosticNotFound(e.0))
    }

    pub fn is_rule_enabled(&self, name: &str) -> bool {
        self.catalog.find(name).is_some() && self.rule_toggles.is_enabled(name)
    }

    pub fn is_diagnostic_enabled(&self, id: &str) -> bool {
        self.diagnostic_toggles.contains(id) && self.diagnostic_toggles.is_enabled(id)
    }

    /// Enabled rules of a class in execution order
    pub fn ordered_enabled_rules(&self, class: RuleClass) -> Vec<&RuleDescriptor> {
        self.catalog
            .ordered_enabled(class, &self.rule_toggles)
            .into_iter()
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Format every document of one project
    pub fn format_project(
        &self,
        solution: &Solution,
        project: ProjectId,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        if solution.project(project).is_none() {
            return Err(WorkspaceError::UnknownProject(project).into());
        }
        self.run(solution, Scope::Project(project), cancel)
    }

    /// Format every project of a solution
    pub fn format_solution(
        &self,
        solution: &Solution,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        self.run(solution, Scope::Solution, cancel)
    }

    fn run(
        &self,
        solution: &Solution,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let start = Instant::now();
        let mut ctx = PassContext::new(&self.filters, cancel, self.options.verbose);

        let (result, totals) = match self.options.mode {
            FormatMode::Rules => (
                self.run_rules(&mut ctx, solution, scope)?,
                FixAllTotals::default(),
            ),
            FormatMode::Analyzers => self.run_fix_all(&mut ctx, solution, scope)?,
        };
        if totals.edits_dropped > 0 {
            log::warn!("{} overlapping fix edit(s) were dropped", totals.edits_dropped);
        }

        let duration = start.elapsed();
        log::info!("Total time {} seconds", duration.as_secs_f64());

        Ok(RunReport {
            solution: result,
            cancelled: cancel.is_cancelled(),
            mode: self.options.mode,
            timings: ctx.timings,
            skipped: ctx.cache.into_skipped(),
            failures: totals.failures,
            diagnostics: totals.diagnostics,
            edits_applied: totals.edits_applied,
            edits_dropped: totals.edits_dropped,
            duration,
        })
    }

    fn run_rules(
        &self,
        ctx: &mut PassContext<'_>,
        solution: &Solution,
        scope: Scope,
    ) -> Result<Solution, EngineError> {
        let syntax = self.instantiate_syntax()?;
        let local = self.instantiate_local()?;
        let global = self.instantiate_global()?;
        let pool = self.thread_pool();

        let working = passes::before_run(solution, &self.options)?;
        let working = self.run_passes(ctx, working, scope, &syntax, &local, &global, pool.as_ref())?;
        Ok(passes::after_run(&working, solution, &self.options)?)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_passes(
        &self,
        ctx: &mut PassContext<'_>,
        working: Solution,
        scope: Scope,
        syntax: &[Active<'_, dyn SyntaxRule>],
        local: &[Active<'_, dyn LocalSemanticRule>],
        global: &[Active<'_, dyn GlobalSemanticRule>],
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<Solution, EngineError> {
        let working = passes::syntax_pass(ctx, working, scope, syntax, pool)?;
        if ctx.cancel.is_cancelled() {
            return Ok(working);
        }
        let working = passes::local_semantic_pass(ctx, working, scope, local)?;
        if ctx.cancel.is_cancelled() {
            return Ok(working);
        }
        passes::global_semantic_pass(ctx, working, scope, global)
    }

    fn run_fix_all(
        &self,
        ctx: &mut PassContext<'_>,
        solution: &Solution,
        scope: Scope,
    ) -> Result<(Solution, FixAllTotals), EngineError> {
        let analyzer_options = match &self.options.settings_file {
            Some(path) => AnalyzerOptions::new().with_settings_file(path).map_err(|e| {
                host_failure([format!("Failed to read settings file {}: {}", path.display(), e)])
            })?,
            None => AnalyzerOptions::new(),
        };
        let pipeline = FixAllPipeline {
            analyzers: &self.analyzers,
            fixers: &self.fixers,
            toggles: &self.diagnostic_toggles,
            options: &analyzer_options,
            filters: &self.filters,
        };

        let mut working = solution.clone();
        let mut totals = FixAllTotals::default();

        for project_id in scope.project_ids(solution) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let name = solution
                .project(project_id)
                .map(|p| p.name().to_string())
                .unwrap_or_default();

            let started = Instant::now();
            match pipeline.run_project(&working, project_id, &mut ctx.cache, ctx.cancel) {
                Ok(outcome) => {
                    working = outcome.solution;
                    totals.diagnostics.extend(outcome.diagnostics);
                    totals.edits_applied += outcome.edits_applied;
                    totals.edits_dropped += outcome.edits_dropped;
                }
                Err(err) if scope == Scope::Solution => {
                    log::error!("Failed to fix project {}: {}", name, err);
                    totals.failures.push(ProjectFailure {
                        project: name.clone(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
            if self.options.verbose {
                log::info!("    {} {} seconds", name, started.elapsed().as_secs_f64());
            }
        }

        Ok((working, totals))
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        if !self.config.parallel {
            return None;
        }
        let jobs = if self.config.jobs > 0 {
            self.config.jobs
        } else {
            num_cpus::get()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to start worker pool, running sequentially: {}", e);
                None
            }
        }
    }

    fn instantiate(&self, class: RuleClass) -> Vec<(&RuleDescriptor, FormattingRule)> {
        self.catalog
            .ordered_enabled(class, &self.rule_toggles)
            .into_iter()
            .map(|entry| (&entry.descriptor, entry.instantiate(&self.options)))
            .collect()
    }

    fn instantiate_syntax(&self) -> Result<Vec<Active<'_, dyn SyntaxRule>>, EngineError> {
        self.instantiate(RuleClass::Syntax)
            .into_iter()
            .map(|(descriptor, rule)| match rule {
                FormattingRule::Syntax(rule) => Ok(Active { descriptor, rule }),
                other => Err(mismatch(descriptor, &other)),
            })
            .collect()
    }

    fn instantiate_local(&self) -> Result<Vec<Active<'_, dyn LocalSemanticRule>>, EngineError> {
        self.instantiate(RuleClass::LocalSemantic)
            .into_iter()
            .map(|(descriptor, rule)| match rule {
                FormattingRule::LocalSemantic(rule) => Ok(Active { descriptor, rule }),
                other => Err(mismatch(descriptor, &other)),
            })
            .collect()
    }

    fn instantiate_global(&self) -> Result<Vec<Active<'_, dyn GlobalSemanticRule>>, EngineError> {
        self.instantiate(RuleClass::GlobalSemantic)
            .into_iter()
            .map(|(descriptor, rule)| match rule {
                FormattingRule::GlobalSemantic(rule) => Ok(Active { descriptor, rule }),
                other => Err(mismatch(descriptor, &other)),
            })
            .collect()
    }
}

fn mismatch(descriptor: &RuleDescriptor, rule: &FormattingRule) -> EngineError {
    EngineError::RuleClassMismatch {
        rule: descriptor.name.clone(),
        expected: descriptor.class,
        actual: rule.class(),
    }
}
