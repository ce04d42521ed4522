//! Integration tests for the formatting pipeline

use codefmt::analyzer::{AnalyzerOptions, DiagnosticAnalyzer};
use codefmt::diagnostic::{Diagnostic, DiagnosticDescriptor, Location};
use codefmt::fixer::{CodeFixer, FixAllContext, FixError, TextEdit};
use codefmt::loader::load_target;
use codefmt::plugins::analyzers::{builtin_analyzers, builtin_fixers};
use codefmt::plugins::rules::{builtin_catalog, COPYRIGHT_HEADER, UNNECESSARY_IMPORTS};
use codefmt::plugins::text::TextProvider;
use codefmt::rule::RuleError;
use codefmt::{
    Document, DocumentId, Engine, EngineError, FormatMode, FormattingOptions, FormattingRule,
    GlobalSemanticRule, Language, LocalSemanticRule, ParseOptions, Project, ProjectId,
    RuleCatalog, RuleClass, RuleDescriptor, Solution, SyntaxTree, Trivia, Workspace,
    FORMATTER_SYMBOL,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn solution(files: &[(&str, &str)]) -> (Solution, ProjectId, Vec<DocumentId>) {
    let (mut s, p) = Solution::new(Arc::new(TextProvider::new())).add_project(
        "App",
        Language::CSharp,
        ParseOptions::default(),
    );
    let mut ids = Vec::new();
    for (name, text) in files {
        let (next, id) = s.add_document(p, name, None, text).unwrap();
        s = next;
        ids.push(id);
    }
    (s, p, ids)
}

fn text_of(s: &Solution, id: DocumentId) -> String {
    s.document(id).unwrap().text()
}

fn header(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

fn builtin_engine(options: FormattingOptions) -> Engine {
    let mut builder = Engine::builder(options).catalog(builtin_catalog());
    for analyzer in builtin_analyzers() {
        builder = builder.analyzer(analyzer);
    }
    for fixer in builtin_fixers() {
        builder = builder.fixer(fixer);
    }
    builder.build().unwrap()
}

#[test]
fn test_copyright_scenario_is_idempotent() {
    let (s, _, ids) = solution(&[("Program.cs", "using System;\n\nclass Program {}\n")]);
    let engine = builtin_engine(
        FormattingOptions::new().with_copyright_header(header(&["Copyright X", "All rights reserved."])),
    );
    let cancel = CancellationToken::new();

    let first = engine.format_solution(&s, &cancel).unwrap();
    assert_eq!(
        text_of(&first.solution, ids[0]),
        "// Copyright X\n// All rights reserved.\n\nusing System;\n\nclass Program {}\n"
    );

    let second = engine.format_solution(&first.solution, &cancel).unwrap();
    assert!(second.solution.changed_documents(&first.solution).is_empty());
    assert_eq!(second.timings.rules[COPYRIGHT_HEADER].change_count, 0);
}

#[test]
fn test_unknown_rule_toggle_fails_without_mutation() {
    let mut engine = builtin_engine(FormattingOptions::new());
    let before = engine.ordered_enabled_rules(RuleClass::Syntax).len();

    let err = engine.toggle_rule("NoSuchRule", false).unwrap_err();
    assert!(matches!(err, EngineError::RuleNotFound(ref name) if name == "NoSuchRule"));
    assert_eq!(engine.ordered_enabled_rules(RuleClass::Syntax).len(), before);
    assert!(engine.toggle_diagnostic("FMT9999", true).is_err());
}

#[test]
fn test_reenabled_rule_keeps_position() {
    let mut engine = builtin_engine(FormattingOptions::new());
    let names = |e: &Engine| -> Vec<String> {
        e.ordered_enabled_rules(RuleClass::Syntax)
            .iter()
            .map(|d| d.name.clone())
            .collect()
    };
    let original = names(&engine);

    engine.toggle_rule("xmlcopyrightheader", false).unwrap();
    assert_eq!(names(&engine), vec![COPYRIGHT_HEADER]);
    engine.toggle_rule("XmlCopyrightHeader", true).unwrap();
    assert_eq!(names(&engine), original);
}

#[test]
fn test_read_only_document_is_skipped_with_one_warning() {
    let dir = TempDir::new().unwrap();
    let d1 = dir.path().join("D1.cs");
    let d2 = dir.path().join("D2.cs");
    std::fs::write(&d1, "class D1 {}\n").unwrap();
    std::fs::write(&d2, "class D2 {}\n").unwrap();
    let mut perms = std::fs::metadata(&d2).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&d2, perms).unwrap();

    let (s, p) = Solution::new(Arc::new(TextProvider::new())).add_project(
        "App",
        Language::CSharp,
        ParseOptions::default(),
    );
    let (s, id1) = s
        .add_document(p, "D1.cs", Some(d1.clone()), "class D1 {}\n")
        .unwrap();
    let (s, id2) = s
        .add_document(p, "D2.cs", Some(d2.clone()), "class D2 {}\n")
        .unwrap();

    let engine = builtin_engine(
        FormattingOptions::new()
            .with_copyright_header(header(&["Copyright X"]))
            .with_file_names(vec!["D1.cs".to_string(), "D2.cs".to_string()]),
    );
    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, d2);
    assert_eq!(report.skipped[0].reason, "is read-only");
    assert!(text_of(&report.solution, id1).starts_with("// Copyright X\n"));
    assert_eq!(text_of(&report.solution, id2), "class D2 {}\n");
}

#[test]
fn test_file_name_filter_excludes_silently() {
    let (s, _, ids) = solution(&[("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")]);
    let engine = builtin_engine(
        FormattingOptions::new()
            .with_copyright_header(header(&["Copyright X"]))
            .with_file_names(vec!["b.cs".to_string()]),
    );
    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();

    assert!(report.skipped.is_empty());
    assert_eq!(text_of(&report.solution, ids[0]), "class A {}\n");
    assert!(text_of(&report.solution, ids[1]).starts_with("// Copyright X"));
}

/// Local rule prepending a marker comment and recording what it saw
struct Marker {
    marker: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
}

impl LocalSemanticRule for Marker {
    fn process(
        &self,
        _document: &Document,
        tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Arc<SyntaxTree>, RuleError> {
        self.seen.lock().unwrap().push(tree.full_text());
        let mut trivia = vec![Trivia::line_comment(self.marker), Trivia::end_of_line("\n")];
        trivia.extend_from_slice(tree.leading_trivia());
        Ok(tree.with_leading_trivia(trivia))
    }
}

#[test]
fn test_local_rules_never_observe_later_rule_edits() {
    let (s, _, ids) = solution(&[("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")]);
    let seen_first = Arc::new(Mutex::new(Vec::new()));
    let seen_second = Arc::new(Mutex::new(Vec::new()));

    let mut catalog = RuleCatalog::new();
    let second = Arc::clone(&seen_second);
    catalog
        .register(
            RuleDescriptor::new("Second", RuleClass::LocalSemantic).with_order(2),
            move |_| {
                FormattingRule::LocalSemantic(Box::new(Marker {
                    marker: "// second",
                    seen: Arc::clone(&second),
                }))
            },
        )
        .unwrap();
    let first = Arc::clone(&seen_first);
    catalog
        .register(
            RuleDescriptor::new("First", RuleClass::LocalSemantic).with_order(1),
            move |_| {
                FormattingRule::LocalSemantic(Box::new(Marker {
                    marker: "// first",
                    seen: Arc::clone(&first),
                }))
            },
        )
        .unwrap();

    let engine = Engine::builder(FormattingOptions::new())
        .catalog(catalog)
        .build()
        .unwrap();
    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();

    let seen_first = seen_first.lock().unwrap();
    assert_eq!(seen_first.len(), 2);
    assert!(seen_first.iter().all(|t| !t.contains("// second")));
    let seen_second = seen_second.lock().unwrap();
    assert!(seen_second.iter().all(|t| t.starts_with("// first\n")));
    assert_eq!(
        text_of(&report.solution, ids[1]),
        "// second\n// first\nclass B {}\n"
    );
}

struct AddDocument;

impl GlobalSemanticRule for AddDocument {
    fn process(
        &self,
        solution: &Solution,
        document: &Document,
        _tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Solution, RuleError> {
        let exists = solution
            .document_ids()
            .iter()
            .any(|id| solution.document(*id).is_some_and(|d| d.name() == "Generated.cs"));
        if exists {
            return Ok(solution.clone());
        }
        let (next, _) = solution.add_document(
            document.project_id(),
            "Generated.cs",
            None,
            "class Generated {}\n",
        )?;
        Ok(next)
    }
}

struct RecordNames(Arc<Mutex<Vec<String>>>);

impl GlobalSemanticRule for RecordNames {
    fn process(
        &self,
        solution: &Solution,
        document: &Document,
        _tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Solution, RuleError> {
        self.0.lock().unwrap().push(document.name().to_string());
        Ok(solution.clone())
    }
}

#[test]
fn test_global_rule_added_document_is_seen_by_later_rules() {
    let (s, _, _) = solution(&[("A.cs", "class A {}\n")]);
    let names = Arc::new(Mutex::new(Vec::new()));

    let mut catalog = RuleCatalog::new();
    catalog
        .register(
            RuleDescriptor::new("Add", RuleClass::GlobalSemantic).with_order(1),
            |_| FormattingRule::GlobalSemantic(Box::new(AddDocument)),
        )
        .unwrap();
    let recorded = Arc::clone(&names);
    catalog
        .register(
            RuleDescriptor::new("Record", RuleClass::GlobalSemantic).with_order(2),
            move |_| FormattingRule::GlobalSemantic(Box::new(RecordNames(Arc::clone(&recorded)))),
        )
        .unwrap();

    let engine = Engine::builder(FormattingOptions::new())
        .catalog(catalog)
        .build()
        .unwrap();
    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();

    assert_eq!(*names.lock().unwrap(), vec!["A.cs", "Generated.cs"]);
    assert_eq!(report.solution.document_count(), 2);
}

/// Reports fixed diagnostics at the start of documents by name
struct FixedAnalyzer {
    reports: Vec<(&'static str, &'static str)>,
}

impl DiagnosticAnalyzer for FixedAnalyzer {
    fn name(&self) -> &str {
        "FixedAnalyzer"
    }

    fn supported_diagnostics(&self) -> Vec<DiagnosticDescriptor> {
        let mut ids: Vec<&str> = self.reports.iter().map(|(id, _)| *id).collect();
        ids.dedup();
        ids.into_iter()
            .map(|id| DiagnosticDescriptor::new(id, id, id, "Test"))
            .collect()
    }

    fn analyze(
        &self,
        solution: &Solution,
        project: &Project,
        _options: &AnalyzerOptions,
        _cancel: &CancellationToken,
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for (id, name) in &self.reports {
            for doc_id in project.document_ids() {
                let document = solution.document(*doc_id).unwrap();
                if document.name() == *name {
                    let descriptor = DiagnosticDescriptor::new(id, id, id, "Test");
                    out.push(Diagnostic::new(&descriptor, id, Location::in_document(document, 0..5)));
                }
            }
        }
        out
    }
}

/// Replaces the diagnostic span with a fixed text
struct ReplaceFixer {
    name: &'static str,
    id: &'static str,
    span: std::ops::Range<usize>,
    text: &'static str,
}

impl CodeFixer for ReplaceFixer {
    fn name(&self) -> &str {
        self.name
    }

    fn fixable_ids(&self) -> Vec<String> {
        vec![self.id.to_string()]
    }

    fn fix_all(&self, context: &FixAllContext<'_>) -> Result<Vec<TextEdit>, FixError> {
        Ok(context
            .diagnostics
            .iter()
            .map(|d| TextEdit::replace(d.location.document, self.span.clone(), self.text))
            .collect())
    }
}

fn fix_all_engine(analyzer: FixedAnalyzer, fixers: Vec<ReplaceFixer>) -> Engine {
    let mut builder = Engine::builder(FormattingOptions::new().with_mode(FormatMode::Analyzers))
        .analyzer(Arc::new(analyzer));
    for fixer in fixers {
        builder = builder.fixer(Arc::new(fixer));
    }
    builder.build().unwrap()
}

#[test]
fn test_fix_all_with_missing_fixer_applies_nothing() {
    let (s, p, ids) = solution(&[("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")]);
    let engine = fix_all_engine(
        FixedAnalyzer {
            reports: vec![("CS001", "A.cs"), ("CS001", "B.cs"), ("CS002", "A.cs")],
        },
        vec![ReplaceFixer {
            name: "Fix1",
            id: "CS001",
            span: 0..5,
            text: "CLASS",
        }],
    );
    let cancel = CancellationToken::new();

    let err = engine.format_project(&s, p, &cancel).unwrap_err();
    assert!(matches!(err, EngineError::UnresolvableDiagnostic { ref id, .. } if id == "CS002"));

    let report = engine.format_solution(&s, &cancel).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].project, "App");
    assert!(!report.is_success());
    assert_eq!(text_of(&report.solution, ids[0]), "class A {}\n");
    assert_eq!(text_of(&report.solution, ids[1]), "class B {}\n");
}

#[test]
fn test_fix_all_applies_batched_edits() {
    let (s, p, ids) = solution(&[("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")]);
    let engine = fix_all_engine(
        FixedAnalyzer {
            reports: vec![("CS001", "A.cs"), ("CS001", "B.cs")],
        },
        vec![ReplaceFixer {
            name: "Fix1",
            id: "CS001",
            span: 0..5,
            text: "struct",
        }],
    );

    let report = engine
        .format_project(&s, p, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(text_of(&report.solution, ids[0]), "struct A {}\n");
    assert_eq!(text_of(&report.solution, ids[1]), "struct B {}\n");
}

#[test]
fn test_disabled_diagnostic_is_not_fixed() {
    let (s, p, ids) = solution(&[("A.cs", "class A {}\n")]);
    let mut engine = fix_all_engine(
        FixedAnalyzer {
            reports: vec![("CS001", "A.cs"), ("CS002", "A.cs")],
        },
        vec![ReplaceFixer {
            name: "Fix1",
            id: "CS001",
            span: 0..5,
            text: "struct",
        }],
    );
    engine.toggle_diagnostic("cs002", false).unwrap();

    let report = engine
        .format_project(&s, p, &CancellationToken::new())
        .unwrap();
    assert_eq!(text_of(&report.solution, ids[0]), "struct A {}\n");
}

#[test]
fn test_overlapping_fix_all_edits_first_wins() {
    let (s, p, ids) = solution(&[("A.cs", "class A {}\n")]);
    let engine = fix_all_engine(
        FixedAnalyzer {
            reports: vec![("CS001", "A.cs"), ("CS002", "A.cs")],
        },
        vec![
            ReplaceFixer {
                name: "Fix1",
                id: "CS001",
                span: 0..5,
                text: "struct",
            },
            ReplaceFixer {
                name: "Fix2",
                id: "CS002",
                span: 2..7,
                text: "XXXXX",
            },
        ],
    );

    let report = engine
        .format_project(&s, p, &CancellationToken::new())
        .unwrap();
    assert_eq!(text_of(&report.solution, ids[0]), "struct A {}\n");
    assert_eq!(report.edits_applied, 1);
    assert_eq!(report.edits_dropped, 1);
}

#[test]
fn test_builtin_analyzer_mode_removes_imports() {
    let (s, _, ids) = solution(&[(
        "A.cs",
        "using System;\nusing System;\nusing IO = System.IO;\nclass A {}\n",
    )]);
    let engine = builtin_engine(FormattingOptions::new().with_mode(FormatMode::Analyzers));

    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(text_of(&report.solution, ids[0]), "using System;\nclass A {}\n");
}

/// Cancels the run after its first document
struct CancelAfterFirst(CancellationToken);

impl LocalSemanticRule for CancelAfterFirst {
    fn process(
        &self,
        _document: &Document,
        tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Arc<SyntaxTree>, RuleError> {
        self.0.cancel();
        let mut trivia = vec![Trivia::line_comment("// seen"), Trivia::end_of_line("\n")];
        trivia.extend_from_slice(tree.leading_trivia());
        Ok(tree.with_leading_trivia(trivia))
    }
}

#[test]
fn test_cancellation_returns_last_committed_snapshot() {
    let (s, _, ids) = solution(&[("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")]);
    let cancel = CancellationToken::new();

    let mut catalog = RuleCatalog::new();
    let token = cancel.clone();
    catalog
        .register(
            RuleDescriptor::new("CancelAfterFirst", RuleClass::LocalSemantic),
            move |_| FormattingRule::LocalSemantic(Box::new(CancelAfterFirst(token.clone()))),
        )
        .unwrap();
    let engine = Engine::builder(FormattingOptions::new())
        .catalog(catalog)
        .build()
        .unwrap();

    let report = engine.format_solution(&s, &cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(text_of(&report.solution, ids[0]), "// seen\nclass A {}\n");
    assert_eq!(text_of(&report.solution, ids[1]), "class B {}\n");
}

#[test]
fn test_cancelled_before_start_changes_nothing() {
    let (s, _, ids) = solution(&[("A.cs", "class A {}\n")]);
    let engine = builtin_engine(FormattingOptions::new().with_copyright_header(header(&["Copyright X"])));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = engine.format_solution(&s, &cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(text_of(&report.solution, ids[0]), "class A {}\n");
}

/// Records whether the formatter symbol was defined while it ran
struct SymbolRecorder(Arc<Mutex<Vec<bool>>>);

impl LocalSemanticRule for SymbolRecorder {
    fn process(
        &self,
        _document: &Document,
        tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Arc<SyntaxTree>, RuleError> {
        self.0.lock().unwrap().push(tree.is_line_disabled(1));
        Ok(Arc::clone(tree))
    }
}

#[test]
fn test_formatter_symbol_never_leaks() {
    let (s, p, ids) = solution(&[(
        "A.cs",
        "#if !CODE_FORMATTER\nusing A;\nusing A;\n#endif\nclass C {}\n",
    )]);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut catalog = builtin_catalog();
    let recorded = Arc::clone(&seen);
    catalog
        .register(
            RuleDescriptor::new("RecordSymbol", RuleClass::LocalSemantic).with_order(-1),
            move |_| FormattingRule::LocalSemantic(Box::new(SymbolRecorder(Arc::clone(&recorded)))),
        )
        .unwrap();
    let engine = Engine::builder(FormattingOptions::new().with_allow_tables(true))
        .catalog(catalog)
        .build()
        .unwrap();

    let report = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true]);
    let project = report.solution.project(p).unwrap();
    assert!(!project.parse_options().is_defined(FORMATTER_SYMBOL));
    let tree = report.solution.document(ids[0]).unwrap().tree();
    assert!(!tree.is_line_disabled(1));
    // the duplicate sat in a region inactive during the run
    assert_eq!(text_of(&report.solution, ids[0]), text_of(&s, ids[0]));
}

#[test]
fn test_unnecessary_imports_rule_runs_in_rules_mode() {
    let (s, _, ids) = solution(&[("A.cs", "using B;\nusing B;\nclass C {}\n")]);
    let mut engine = builtin_engine(FormattingOptions::new());
    let cancel = CancellationToken::new();

    let report = engine.format_solution(&s, &cancel).unwrap();
    assert_eq!(text_of(&report.solution, ids[0]), "using B;\nclass C {}\n");

    engine.toggle_rule(UNNECESSARY_IMPORTS, false).unwrap();
    let report = engine.format_solution(&s, &cancel).unwrap();
    assert_eq!(text_of(&report.solution, ids[0]), text_of(&s, ids[0]));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let files: Vec<(String, String)> = (0..16)
        .map(|i| (format!("F{}.cs", i), format!("// <copyright file=\"F{i}.cs\">\n// </copyright>\nclass F{i} {{}}\n")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect();
    let (s, _, ids) = solution(&refs);
    let options = FormattingOptions::new().with_copyright_header(header(&["Copyright X"]));
    let cancel = CancellationToken::new();

    let parallel = Engine::builder(options.clone())
        .catalog(builtin_catalog())
        .engine_config(codefmt::config::EngineConfig {
            parallel: true,
            jobs: 4,
        })
        .build()
        .unwrap()
        .format_solution(&s, &cancel)
        .unwrap();
    let sequential = Engine::builder(options)
        .catalog(builtin_catalog())
        .engine_config(codefmt::config::EngineConfig {
            parallel: false,
            jobs: 0,
        })
        .build()
        .unwrap()
        .format_solution(&s, &cancel)
        .unwrap();

    for id in ids {
        assert_eq!(text_of(&parallel.solution, id), text_of(&sequential.solution, id));
    }
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

#[test]
fn test_loaded_directory_is_written_back() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "A.cs", "class A {}\n");
    write(dir.path(), "B.cs", "// Copyright X\n\nclass B {}\n");

    let target = load_target(dir.path(), Language::CSharp, Arc::new(TextProvider::new())).unwrap();
    let engine = builtin_engine(FormattingOptions::new().with_copyright_header(header(&["Copyright X"])));
    let report = engine
        .format_solution(&target.solution, &CancellationToken::new())
        .unwrap();

    let mut dry = Workspace::new(target.solution.clone()).with_dry_run(true);
    let summary = dry.try_apply_changes(report.solution.clone()).unwrap();
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("A.cs")).unwrap(),
        "class A {}\n"
    );

    let mut workspace = Workspace::new(target.solution);
    let summary = workspace.try_apply_changes(report.solution).unwrap();
    assert_eq!(summary.changed_paths(), vec![dir.path().join("A.cs").as_path()]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("A.cs")).unwrap(),
        "// Copyright X\n\nclass A {}\n"
    );
}

#[test]
fn test_cancelled_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "A.cs", "class A {}\n");
    write(dir.path(), "B.cs", "class B {}\n");

    let target = load_target(dir.path(), Language::CSharp, Arc::new(TextProvider::new())).unwrap();
    let cancel = CancellationToken::new();
    let mut catalog = builtin_catalog();
    let token = cancel.clone();
    catalog
        .register(
            RuleDescriptor::new("CancelAfterFirst", RuleClass::LocalSemantic),
            move |_| FormattingRule::LocalSemantic(Box::new(CancelAfterFirst(token.clone()))),
        )
        .unwrap();
    let engine = Engine::builder(FormattingOptions::new().with_copyright_header(header(&["Copyright X"])))
        .catalog(catalog)
        .build()
        .unwrap();

    let report = engine.format_solution(&target.solution, &cancel).unwrap();
    assert!(report.cancelled);
    assert!(!report.solution.changed_documents(&target.solution).is_empty());

    let mut workspace = Workspace::new(target.solution.clone());
    let summary = report.persist(&mut workspace).unwrap();
    assert!(summary.changes.is_empty());
    assert!(workspace.current_solution().changed_documents(&target.solution).is_empty());
    for (name, text) in [("A.cs", "class A {}\n"), ("B.cs", "class B {}\n")] {
        assert_eq!(std::fs::read_to_string(dir.path().join(name)).unwrap(), text);
    }
}

#[test]
fn test_custom_header_is_idempotent_across_runs() {
    let (s, _, ids) = solution(&[("A.cs", "class A {}\n")]);
    let engine = builtin_engine(
        FormattingOptions::new().with_copyright_header(header(&["Licensed to the .NET Foundation"])),
    );

    let first = engine
        .format_solution(&s, &CancellationToken::new())
        .unwrap();
    let expected = "// Licensed to the .NET Foundation\n\nclass A {}\n";
    assert_eq!(text_of(&first.solution, ids[0]), expected);

    let second = engine
        .format_solution(&first.solution, &CancellationToken::new())
        .unwrap();
    assert_eq!(text_of(&second.solution, ids[0]), expected);
}

#[test]
fn test_engine_rejects_duplicate_fixers() {
    let result = Engine::builder(FormattingOptions::new())
        .fixer(Arc::new(ReplaceFixer {
            name: "One",
            id: "CS001",
            span: 0..1,
            text: "",
        }))
        .fixer(Arc::new(ReplaceFixer {
            name: "Two",
            id: "CS001",
            span: 0..1,
            text: "",
        }))
        .build();
    assert!(matches!(result, Err(EngineError::DuplicateFixer(_))));
}
