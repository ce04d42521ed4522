//! Duplicate and unused import removal

use crate::rule::{LocalSemanticRule, RuleError};
use crate::semantic::SemanticModel;
use crate::syntax::SyntaxTree;
use crate::workspace::Document;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Body lines holding imports that can be removed
///
/// An import is unnecessary when an earlier import binds the same thing or
/// when it declares an alias that is never referenced. Imports inside
/// inactive preprocessor regions are left alone.
pub fn find_unnecessary_imports(model: &dyn SemanticModel) -> BTreeSet<usize> {
    let mut seen = HashSet::new();
    let mut lines = BTreeSet::new();

    for import in model.imports() {
        if import.in_disabled_region {
            continue;
        }
        if !seen.insert(import.binding_key()) {
            lines.insert(import.body_line);
            continue;
        }
        if let Some(alias) = &import.alias {
            if !model.is_referenced(alias) {
                lines.insert(import.body_line);
            }
        }
    }

    lines
}

/// Remove unnecessary imports from each document
#[derive(Debug, Clone, Copy, Default)]
pub struct UnnecessaryImportsRule;

impl LocalSemanticRule for UnnecessaryImportsRule {
    fn process(
        &self,
        document: &Document,
        tree: &Arc<SyntaxTree>,
        _cancel: &CancellationToken,
    ) -> Result<Arc<SyntaxTree>, RuleError> {
        let model = document.semantic_model();
        if !Arc::ptr_eq(model.tree(), tree) {
            return Err(RuleError::Failed(format!(
                "semantic model of {} is out of date",
                document.name()
            )));
        }

        let remove = find_unnecessary_imports(model.as_ref());
        if remove.is_empty() {
            return Ok(Arc::clone(tree));
        }
        log::debug!("Removing {} import(s) from {}", remove.len(), document.name());
        Ok(tree.without_body_lines(&remove))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::text::TextProvider;
    use crate::syntax::{Language, ParseOptions};
    use crate::workspace::Solution;
    use pretty_assertions::assert_eq;

    fn document(text: &str, language: Language) -> Arc<Document> {
        let (s, p) = Solution::new(Arc::new(TextProvider::new())).add_project(
            "P",
            language,
            ParseOptions::default(),
        );
        let (s, d) = s.add_document(p, "A", None, text).unwrap();
        Arc::clone(s.document(d).unwrap())
    }

    fn apply(text: &str, language: Language) -> String {
        let doc = document(text, language);
        UnnecessaryImportsRule
            .process(&doc, doc.tree(), &CancellationToken::new())
            .unwrap()
            .full_text()
    }

    #[test]
    fn test_removes_duplicates_and_unused_aliases() {
        let text = "// Header\nusing System;\nusing IO = System.IO;\nusing System;\nusing Col = System.Collections;\nclass C { Col.ArrayList a; }\n";
        assert_eq!(
            apply(text, Language::CSharp),
            "// Header\nusing System;\nusing Col = System.Collections;\nclass C { Col.ArrayList a; }\n"
        );
    }

    #[test]
    fn test_keeps_imports_in_inactive_regions() {
        let text = "using System;\n#if NEVER\nusing System;\n#endif\nclass C {}\n";
        assert_eq!(apply(text, Language::CSharp), text);
    }

    #[test]
    fn test_visual_basic_aliases_are_case_insensitive() {
        let text = "Imports Col = System.Collections\nImports System\nImports SYSTEM2 = System\nModule M\n  Dim a As COL.ArrayList\nEnd Module\n";
        assert_eq!(
            apply(text, Language::VisualBasic),
            "Imports Col = System.Collections\nImports System\nModule M\n  Dim a As COL.ArrayList\nEnd Module\n"
        );
    }

    #[test]
    fn test_no_change_returns_same_tree() {
        let doc = document("using System;\nclass C {}\n", Language::CSharp);
        let out = UnnecessaryImportsRule
            .process(&doc, doc.tree(), &CancellationToken::new())
            .unwrap();
        assert!(Arc::ptr_eq(&out, doc.tree()));
    }
}
