//! codefmt - Rule-driven source formatter for C# and Visual Basic
//!
//! Runs an ordered set of formatting rules over every document of a solution
//! snapshot and produces a new snapshot.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Loader -> Solution -> Engine -> passes / fix-all -> Solution -> Workspace
//! ```
//!
//! The engine runs three passes in order (syntax, local-semantic,
//! global-semantic), or in analyzer mode collects diagnostics and applies
//! their fixes in one batch per project. Every document goes through the
//! filter chain before any rule sees it.
//!
//! # Example
//!
//! ```no_run
//! use codefmt::plugins::rules::builtin_catalog;
//! use codefmt::plugins::text::TextProvider;
//! use codefmt::{Engine, FormattingOptions, Language, ParseOptions, Solution};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let options = FormattingOptions::new()
//!     .with_copyright_header(vec!["Copyright (c) Contoso".to_string()]);
//! let engine = Engine::builder(options)
//!     .catalog(builtin_catalog())
//!     .build()
//!     .unwrap();
//!
//! let (solution, project) = Solution::new(Arc::new(TextProvider::new()))
//!     .add_project("App", Language::CSharp, ParseOptions::default());
//! let (solution, _) = solution
//!     .add_document(project, "Program.cs", None, "class Program {}\n")
//!     .unwrap();
//!
//! let report = engine
//!     .format_solution(&solution, &CancellationToken::new())
//!     .unwrap();
//! assert!(!report.cancelled);
//! ```

pub mod analyzer;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod filter;
pub mod fix_all;
pub mod fixer;
pub mod loader;
pub mod options;
pub mod output;
pub mod passes;
pub mod provider;
pub mod rule;
pub mod semantic;
pub mod syntax;
pub mod workspace;

// Re-export main types
pub use analyzer::{AnalyzerOptions, DiagnosticAnalyzer};
pub use config::Config;
pub use diagnostic::{Diagnostic, DiagnosticDescriptor, Location, Severity};
pub use engine::{Engine, EngineBuilder, EngineError, RunReport, RuleTiming};
pub use filter::{DocumentFilter, FilterChain, FilterDecision};
pub use fixer::{CodeFixer, EditBatch, FixAllContext, TextEdit};
pub use options::{FormatMode, FormattingOptions, FORMATTER_SYMBOL};
pub use output::OutputFormatter;
pub use passes::Scope;
pub use provider::AnalysisProvider;
pub use rule::{
    FormattingRule, GlobalSemanticRule, LocalSemanticRule, RuleCatalog, RuleClass, RuleDescriptor,
    SyntaxRule, ToggleMap,
};
pub use semantic::SemanticModel;
pub use syntax::{Language, ParseOptions, SyntaxTree, Trivia, TriviaKind};
pub use workspace::{Document, DocumentId, Project, ProjectId, Solution, Workspace};

// Built-in plugins
pub mod plugins {
    pub mod analyzers;
    pub mod rules;
    pub mod text;
}
