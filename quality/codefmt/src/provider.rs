//! Analysis provider seam
//!
//! The engine never builds a grammar itself. Parsing and semantic analysis are
//! delegated to an [`AnalysisProvider`]; the crate ships a text-level provider
//! in [`crate::plugins::text`].

use crate::semantic::SemanticModel;
use crate::syntax::{Language, ParseOptions, SyntaxTree};
use std::sync::Arc;

/// Source-analysis provider consumed by the workspace and the rules
pub trait AnalysisProvider: Send + Sync {
    /// Provider identifier (e.g., "text")
    fn id(&self) -> &str;

    /// Languages this provider can parse
    fn languages(&self) -> &[Language];

    /// Parse text into a tree under the given parse options
    fn parse(&self, text: &str, language: Language, options: &ParseOptions) -> Arc<SyntaxTree>;

    /// Compute the semantic model of a tree
    fn semantic_model(&self, tree: &Arc<SyntaxTree>) -> Arc<dyn SemanticModel>;

    /// Check whether the provider handles a language
    fn supports(&self, language: Language) -> bool {
        self.languages().contains(&language)
    }
}
