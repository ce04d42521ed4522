//! Copyright header insertion

use crate::plugins::text::comment_prefix;
use crate::rule::SyntaxRule;
use crate::syntax::{Language, SyntaxTree, Trivia};
use std::sync::Arc;

/// Single-line comment syntax of a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `// text`
    DoubleSlash,
    /// `' text`
    Apostrophe,
}

impl CommentStyle {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::CSharp => CommentStyle::DoubleSlash,
            Language::VisualBasic => CommentStyle::Apostrophe,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            CommentStyle::DoubleSlash => comment_prefix(Language::CSharp),
            CommentStyle::Apostrophe => comment_prefix(Language::VisualBasic),
        }
    }

    /// Render a comment line (without line terminator)
    pub fn comment(&self, text: &str) -> String {
        format!("{} {}", self.prefix(), text)
    }
}

/// Strip comment delimiters from a configured header line
fn header_text(line: &str) -> String {
    if let Some(rest) = line.strip_prefix('\'') {
        return rest.trim_start().to_string();
    }
    if let Some(rest) = line.strip_prefix("//") {
        return rest.trim_start().to_string();
    }
    line.to_string()
}

/// Make every document start with the configured copyright header
///
/// An existing header is replaced when its leading comment block mentions
/// "copyright" or already starts with the configured lines; otherwise the new
/// header is put in front of the existing trivia.
#[derive(Debug, Clone, Default)]
pub struct CopyrightHeaderRule {
    header: Vec<String>,
}

impl CopyrightHeaderRule {
    pub fn new(lines: &[String]) -> Self {
        Self {
            header: lines.iter().map(|l| header_text(l)).collect(),
        }
    }

    /// Normalized header lines, without comment delimiters
    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn new_header(&self, style: CommentStyle, newline: &str) -> Vec<Trivia> {
        let mut trivia = Vec::with_capacity(self.header.len() * 2 + 1);
        for line in &self.header {
            trivia.push(Trivia::line_comment(&style.comment(line)));
            trivia.push(Trivia::end_of_line(newline));
        }
        trivia.push(Trivia::end_of_line(newline));
        trivia
    }
}

fn skip_blank(trivia: &[Trivia], mut index: usize) -> usize {
    while index < trivia.len() && (trivia[index].is_whitespace() || trivia[index].is_end_of_line()) {
        index += 1;
    }
    index
}

/// Leading trivia with an existing header comment block removed
///
/// The leading comment block is a header when one of its comments mentions
/// "copyright" or when it starts with the configured header lines.
fn remove_existing_header<'a>(trivia: &'a [Trivia], header: &[String]) -> &'a [Trivia] {
    let mut index = skip_blank(trivia, 0);
    let mut comments = Vec::new();

    while index < trivia.len() && trivia[index].is_line_comment() {
        comments.push(header_text(trivia[index].text.trim()));
        index += 1;
        while index < trivia.len() && trivia[index].is_whitespace() {
            index += 1;
        }
        if index < trivia.len() && trivia[index].is_end_of_line() {
            index += 1;
        }
    }

    let mentions_copyright = comments
        .iter()
        .any(|c| c.to_lowercase().contains("copyright"));
    let starts_with_header = comments.len() >= header.len()
        && comments
            .iter()
            .zip(header)
            .all(|(comment, line)| comment.trim_end() == line.trim_end());

    if comments.is_empty() || !(mentions_copyright || starts_with_header) {
        return trivia;
    }
    &trivia[skip_blank(trivia, index)..]
}

impl SyntaxRule for CopyrightHeaderRule {
    fn process(&self, tree: &Arc<SyntaxTree>, language: Language) -> Arc<SyntaxTree> {
        if self.header.is_empty() {
            return Arc::clone(tree);
        }

        let existing = tree.leading_trivia();
        let mut desired = self.new_header(CommentStyle::for_language(language), tree.newline());
        desired.extend_from_slice(remove_existing_header(existing, &self.header));

        let unchanged = desired.len() == existing.len()
            && desired.iter().zip(existing).all(|(a, b)| a.text == b.text);
        if unchanged {
            return Arc::clone(tree);
        }
        tree.with_leading_trivia(desired)
    }
}
