//! Semantic model abstraction
//!
//! A semantic model answers binding questions about one syntax tree. Models
//! are produced by the analysis provider and cached per document instance.

use crate::syntax::SyntaxTree;
use std::sync::Arc;

/// An import directive (`using X;` / `Imports X`) found in a document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// 0-based body line holding the directive
    pub body_line: usize,
    /// Imported namespace or type, as written
    pub target: String,
    /// Alias name for `using A = B;` forms
    pub alias: Option<String>,
    /// `using static` / type import
    pub is_static: bool,
    /// Directive sits inside an inactive preprocessor region
    pub in_disabled_region: bool,
}

impl ImportDirective {
    /// Key identifying semantically identical directives
    pub fn binding_key(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}={}", alias, self.target),
            None if self.is_static => format!("static {}", self.target),
            None => self.target.clone(),
        }
    }
}

/// Binding information about a single tree
pub trait SemanticModel: Send + Sync {
    /// Tree this model describes
    fn tree(&self) -> &Arc<SyntaxTree>;

    /// Import directives in body order
    fn imports(&self) -> &[ImportDirective];

    /// Whether an identifier is referenced outside import directives
    fn is_referenced(&self, identifier: &str) -> bool;

    /// Whether the document contains conditional compilation directives
    fn has_conditional_directives(&self) -> bool;
}
