//! Line-level semantic model: import bindings and identifier references

use super::preprocessor::{classify, Directive};
use crate::semantic::{ImportDirective, SemanticModel};
use crate::syntax::{Language, SyntaxTree};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

static CSHARP_USING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*using\s+(static\s+)?(?:(\w+)\s*=\s*)?([\w.:]+)\s*;")
        .expect("valid using pattern")
});

static VB_IMPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*Imports\s+(?:(\w+)\s*=\s*)?([\w.]+)\s*(?:'.*)?$")
        .expect("valid Imports pattern")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*").expect("valid identifier pattern"));

/// Semantic model built from a line scan of the body
pub struct TextSemanticModel {
    tree: Arc<SyntaxTree>,
    imports: Vec<ImportDirective>,
    identifiers: HashSet<String>,
    has_conditionals: bool,
}

impl TextSemanticModel {
    pub fn new(tree: Arc<SyntaxTree>) -> Self {
        let language = tree.language();
        let mut imports = Vec::new();
        let mut identifiers = HashSet::new();
        let mut has_conditionals = false;

        for (idx, line) in tree.body().lines().enumerate() {
            if let Some(directive) = classify(line, language) {
                has_conditionals |= matches!(directive, Directive::If(_));
                continue;
            }

            if let Some(import) = parse_import(line, language) {
                imports.push(ImportDirective {
                    body_line: idx,
                    in_disabled_region: tree.is_line_disabled(idx),
                    ..import
                });
                continue;
            }

            if tree.is_line_disabled(idx) {
                continue;
            }

            for m in IDENTIFIER.find_iter(line) {
                identifiers.insert(normalize(m.as_str(), language));
            }
        }

        Self {
            tree,
            imports,
            identifiers,
            has_conditionals,
        }
    }
}

fn normalize(identifier: &str, language: Language) -> String {
    match language {
        Language::CSharp => identifier.to_string(),
        Language::VisualBasic => identifier.to_ascii_lowercase(),
    }
}

/// Parse a single line as an import directive
pub(crate) fn parse_import(line: &str, language: Language) -> Option<ImportDirective> {
    match language {
        Language::CSharp => {
            let caps = CSHARP_USING.captures(line)?;
            Some(ImportDirective {
                body_line: 0,
                target: caps[3].to_string(),
                alias: caps.get(2).map(|m| m.as_str().to_string()),
                is_static: caps.get(1).is_some(),
                in_disabled_region: false,
            })
        }
        Language::VisualBasic => {
            let caps = VB_IMPORTS.captures(line)?;
            Some(ImportDirective {
                body_line: 0,
                target: caps[2].to_string(),
                alias: caps.get(1).map(|m| m.as_str().to_string()),
                is_static: false,
                in_disabled_region: false,
            })
        }
    }
}

impl SemanticModel for TextSemanticModel {
    fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    fn imports(&self) -> &[ImportDirective] {
        &self.imports
    }

    fn is_referenced(&self, identifier: &str) -> bool {
        self.identifiers
            .contains(&normalize(identifier, self.tree.language()))
    }

    fn has_conditional_directives(&self) -> bool {
        self.has_conditionals
    }
}
