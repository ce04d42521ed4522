//! Text-level analysis provider
//!
//! Splits a source file into leading trivia and an opaque body, marks body
//! lines inside inactive `#if` regions and derives import bindings. This is
//! enough structure for header and import rules; it is not a grammar.

mod preprocessor;
mod semantic;
mod trivia;

pub use semantic::TextSemanticModel;

pub(crate) use trivia::comment_prefix;

use crate::provider::AnalysisProvider;
use crate::semantic::SemanticModel;
use crate::syntax::{detect_newline, Language, ParseOptions, SyntaxTree};
use std::sync::Arc;

/// Built-in provider for C# and Visual Basic sources
#[derive(Debug, Clone, Default)]
pub struct TextProvider;

impl TextProvider {
    pub fn new() -> Self {
        Self
    }
}

impl AnalysisProvider for TextProvider {
    fn id(&self) -> &str {
        "text"
    }

    fn languages(&self) -> &[Language] {
        &Language::ALL
    }

    fn parse(&self, text: &str, language: Language, options: &ParseOptions) -> Arc<SyntaxTree> {
        let (leading_trivia, body_start) = trivia::lex_leading_trivia(text, language);
        let body = &text[body_start..];
        let disabled = preprocessor::disabled_lines(body, language, options);

        Arc::new(SyntaxTree::new(
            language,
            leading_trivia,
            body.to_string(),
            detect_newline(text).to_string(),
            disabled,
        ))
    }

    fn semantic_model(&self, tree: &Arc<SyntaxTree>) -> Arc<dyn SemanticModel> {
        Arc::new(TextSemanticModel::new(Arc::clone(tree)))
    }
}
