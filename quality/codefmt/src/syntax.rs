//! Syntax tree abstraction consumed by formatting rules
//!
//! A [`SyntaxTree`] is produced by an [`AnalysisProvider`](crate::provider::AnalysisProvider)
//! and is never mutated in place. Rules that rewrite a tree return a new
//! `Arc<SyntaxTree>`; returning the same `Arc` means "no change". The engine
//! compares trees by identity (`Arc::ptr_eq`), never by content.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Source language of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "C#", alias = "csharp", alias = "cs")]
    CSharp,
    #[serde(rename = "Visual Basic", alias = "visualbasic", alias = "vb")]
    VisualBasic,
}

impl Language {
    /// All languages the engine knows about
    pub const ALL: [Language; 2] = [Language::CSharp, Language::VisualBasic];

    /// Display name used in listings and logs
    pub fn name(&self) -> &'static str {
        match self {
            Language::CSharp => "C#",
            Language::VisualBasic => "Visual Basic",
        }
    }

    /// Map a file extension (without dot) to a language
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "cs" => Some(Language::CSharp),
            "vb" => Some(Language::VisualBasic),
            _ => None,
        }
    }

    /// Source file extension (without dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Language::CSharp => "cs",
            Language::VisualBasic => "vb",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c#" | "csharp" | "cs" => Ok(Language::CSharp),
            "visual basic" | "visualbasic" | "vb" => Ok(Language::VisualBasic),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

/// Per-project parse configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Defined preprocessor symbols
    #[serde(default)]
    pub preprocessor_symbols: Vec<String>,
}

impl ParseOptions {
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            preprocessor_symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Check whether a symbol is defined
    pub fn is_defined(&self, symbol: &str) -> bool {
        self.preprocessor_symbols.iter().any(|s| s == symbol)
    }

    /// Return a copy with the given symbols added (existing ones are kept once)
    pub fn with_symbols<I, S>(&self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = self.clone();
        for symbol in symbols {
            let symbol = symbol.into();
            if !out.is_defined(&symbol) {
                out.preprocessor_symbols.push(symbol);
            }
        }
        out
    }
}

/// Kind of a leading trivia element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    /// Spaces and tabs
    Whitespace,
    /// A line terminator (`\n` or `\r\n`)
    EndOfLine,
    /// A single-line comment, without its line terminator
    LineComment,
}

/// A piece of leading trivia (whitespace, line ending or comment)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub text: String,
}

impl Trivia {
    pub fn whitespace(text: &str) -> Self {
        Self {
            kind: TriviaKind::Whitespace,
            text: text.to_string(),
        }
    }

    pub fn end_of_line(text: &str) -> Self {
        Self {
            kind: TriviaKind::EndOfLine,
            text: text.to_string(),
        }
    }

    pub fn line_comment(text: &str) -> Self {
        Self {
            kind: TriviaKind::LineComment,
            text: text.to_string(),
        }
    }

    pub fn is_line_comment(&self) -> bool {
        self.kind == TriviaKind::LineComment
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TriviaKind::Whitespace
    }

    pub fn is_end_of_line(&self) -> bool {
        self.kind == TriviaKind::EndOfLine
    }
}

impl fmt::Display for Trivia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Immutable syntax tree of one document
///
/// The tree is split into the file's leading trivia and an opaque body. Body
/// lines can be marked as disabled (inside an inactive `#if` region).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    language: Language,
    leading_trivia: Vec<Trivia>,
    body: String,
    newline: String,
    disabled_lines: BTreeSet<usize>,
}

impl SyntaxTree {
    pub fn new(
        language: Language,
        leading_trivia: Vec<Trivia>,
        body: String,
        newline: String,
        disabled_lines: BTreeSet<usize>,
    ) -> Self {
        Self {
            language,
            leading_trivia,
            body,
            newline,
            disabled_lines,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn leading_trivia(&self) -> &[Trivia] {
        &self.leading_trivia
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Newline sequence detected in the source (`"\n"` when the source had none)
    pub fn newline(&self) -> &str {
        &self.newline
    }

    /// Body line indices (0-based) inside inactive preprocessor regions
    pub fn disabled_lines(&self) -> &BTreeSet<usize> {
        &self.disabled_lines
    }

    pub fn is_line_disabled(&self, body_line: usize) -> bool {
        self.disabled_lines.contains(&body_line)
    }

    /// Byte length of the leading trivia
    pub fn leading_trivia_len(&self) -> usize {
        self.leading_trivia.iter().map(|t| t.text.len()).sum()
    }

    /// Reconstruct the full source text
    pub fn full_text(&self) -> String {
        let mut out = String::with_capacity(self.leading_trivia_len() + self.body.len());
        for trivia in &self.leading_trivia {
            out.push_str(&trivia.text);
        }
        out.push_str(&self.body);
        out
    }

    /// Body lines including their line terminators
    pub fn body_lines(&self) -> Vec<&str> {
        self.body.split_inclusive('\n').collect()
    }

    /// Spans of every body line (terminator included) in full-text coordinates
    pub fn body_line_spans(&self) -> Vec<Range<usize>> {
        let mut offset = self.leading_trivia_len();
        self.body_lines()
            .into_iter()
            .map(|line| {
                let span = offset..offset + line.len();
                offset += line.len();
                span
            })
            .collect()
    }

    /// 1-based line number of a body line in the full text
    pub fn line_number_of_body_line(&self, body_line: usize) -> usize {
        let trivia_lines = self
            .leading_trivia
            .iter()
            .filter(|t| t.is_end_of_line())
            .count();
        trivia_lines + body_line + 1
    }

    /// Return a new tree with different leading trivia and the same body
    pub fn with_leading_trivia(&self, leading_trivia: Vec<Trivia>) -> Arc<SyntaxTree> {
        Arc::new(Self {
            language: self.language,
            leading_trivia,
            body: self.body.clone(),
            newline: self.newline.clone(),
            disabled_lines: self.disabled_lines.clone(),
        })
    }

    /// Return a new tree with the given body lines removed
    ///
    /// Disabled-line markers are shifted so they keep pointing at the same
    /// surviving lines.
    pub fn without_body_lines(&self, remove: &BTreeSet<usize>) -> Arc<SyntaxTree> {
        let mut body = String::with_capacity(self.body.len());
        let mut disabled_lines = BTreeSet::new();
        let mut kept = 0usize;
        for (idx, line) in self.body_lines().into_iter().enumerate() {
            if remove.contains(&idx) {
                continue;
            }
            if self.disabled_lines.contains(&idx) {
                disabled_lines.insert(kept);
            }
            body.push_str(line);
            kept += 1;
        }
        Arc::new(Self {
            language: self.language,
            leading_trivia: self.leading_trivia.clone(),
            body,
            newline: self.newline.clone(),
            disabled_lines,
        })
    }
}

/// Detect the newline sequence used by a text
pub fn detect_newline(text: &str) -> &'static str {
    match text.find('\n') {
        Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(body: &str) -> SyntaxTree {
        SyntaxTree::new(
            Language::CSharp,
            vec![
                Trivia::line_comment("// header"),
                Trivia::end_of_line("\n"),
                Trivia::end_of_line("\n"),
            ],
            body.to_string(),
            "\n".to_string(),
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("C#".parse::<Language>().unwrap(), Language::CSharp);
        assert_eq!("csharp".parse::<Language>().unwrap(), Language::CSharp);
        assert_eq!(
            "Visual Basic".parse::<Language>().unwrap(),
            Language::VisualBasic
        );
        assert_eq!("VB".parse::<Language>().unwrap(), Language::VisualBasic);
        assert!("fortran".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("CS"), Some(Language::CSharp));
        assert_eq!(Language::from_extension("vb"), Some(Language::VisualBasic));
        assert_eq!(Language::from_extension("xml"), None);
    }

    #[test]
    fn test_full_text_round_trip() {
        let t = tree("class C {}\n");
        assert_eq!(t.full_text(), "// header\n\nclass C {}\n");
        assert_eq!(t.leading_trivia_len(), 11);
    }

    #[test]
    fn test_body_line_spans_are_full_text_offsets() {
        let t = tree("a\nbb\n");
        let spans = t.body_line_spans();
        let text = t.full_text();
        assert_eq!(&text[spans[0].clone()], "a\n");
        assert_eq!(&text[spans[1].clone()], "bb\n");
        assert_eq!(t.line_number_of_body_line(1), 4);
    }

    #[test]
    fn test_without_body_lines_shifts_disabled_markers() {
        let mut disabled = BTreeSet::new();
        disabled.insert(2);
        let t = SyntaxTree::new(
            Language::CSharp,
            Vec::new(),
            "a\nb\nc\n".to_string(),
            "\n".to_string(),
            disabled,
        );
        let mut remove = BTreeSet::new();
        remove.insert(0);
        let out = t.without_body_lines(&remove);
        assert_eq!(out.body(), "b\nc\n");
        assert!(out.is_line_disabled(1));
        assert!(!out.is_line_disabled(2));
    }

    #[test]
    fn test_with_symbols_deduplicates() {
        let opts = ParseOptions::new(&["DEBUG"]);
        let out = opts.with_symbols(["DEBUG", "TRACE"]);
        assert_eq!(out.preprocessor_symbols, vec!["DEBUG", "TRACE"]);
    }

    #[test]
    fn test_detect_newline() {
        assert_eq!(detect_newline("a\r\nb"), "\r\n");
        assert_eq!(detect_newline("a\nb"), "\n");
        assert_eq!(detect_newline("abc"), "\n");
        assert_eq!(detect_newline("\nabc"), "\n");
    }
}
