//! Removal of XML based copyright headers
//!
//! ```text
//! //-----------------------------------------------------------------------
//! // <copyright file="Foo.cs" company="Contoso">
//! //     Copyright (c) Contoso. All rights reserved.
//! // </copyright>
//! //-----------------------------------------------------------------------
//! ```

use crate::rule::SyntaxRule;
use crate::syntax::{Language, SyntaxTree, Trivia};
use std::sync::Arc;

const RULER_MARKER: &str = "//---";
const START_MARKER: &str = "// <copyright ";
const END_MARKER: &str = "// </copyright>";

/// Strip `// <copyright ...>` ... `// </copyright>` blocks from C# files
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCopyrightHeaderRule;

fn next_comment(trivia: &[Trivia], index: usize) -> Option<&Trivia> {
    trivia[index + 1..].iter().find(|t| t.is_line_comment())
}

fn is_start(trivia: &[Trivia], index: usize) -> bool {
    let text = &trivia[index].text;
    text.starts_with(START_MARKER)
        || (text.starts_with(RULER_MARKER)
            && next_comment(trivia, index).is_some_and(|n| n.text.starts_with(START_MARKER)))
}

/// Index of the last trivia of the header when `index` holds the end marker
fn end_at(trivia: &[Trivia], index: usize) -> Option<usize> {
    if !trivia[index].text.starts_with(END_MARKER) {
        return None;
    }
    let next = trivia[index + 1..]
        .iter()
        .position(|t| t.is_line_comment())
        .map(|offset| index + 1 + offset);
    match next {
        Some(n) if trivia[n].text.starts_with(RULER_MARKER) => Some(n),
        _ => Some(index),
    }
}

/// Inclusive bounds of the XML header, when both markers are present
fn header_bounds(trivia: &[Trivia]) -> Option<(usize, usize)> {
    let mut start = None;
    let mut end = None;
    for index in 0..trivia.len() {
        if !trivia[index].is_line_comment() {
            continue;
        }
        if start.is_none() && is_start(trivia, index) {
            start = Some(index);
        }
        if end.is_none() {
            end = end_at(trivia, index);
        }
    }
    match (start, end) {
        (Some(start), Some(end)) if start <= end => Some((start, end)),
        _ => None,
    }
}

impl SyntaxRule for XmlCopyrightHeaderRule {
    fn process(&self, tree: &Arc<SyntaxTree>, language: Language) -> Arc<SyntaxTree> {
        if language != Language::CSharp {
            return Arc::clone(tree);
        }
        let trivia = tree.leading_trivia();
        let Some((start, end)) = header_bounds(trivia) else {
            return Arc::clone(tree);
        };

        let kept: Vec<Trivia> = trivia
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < start || *i > end)
            .map(|(_, t)| t.clone())
            .collect();
        tree.with_leading_trivia(kept)
    }
}
