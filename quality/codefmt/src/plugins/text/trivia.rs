//! Leading trivia lexer

use crate::syntax::{Language, Trivia};

/// Single-line comment prefix for a language
pub(crate) fn comment_prefix(language: Language) -> &'static str {
    match language {
        Language::CSharp => "//",
        Language::VisualBasic => "'",
    }
}

/// Split the leading trivia off a source text
///
/// Returns the trivia and the byte offset where the body starts. Lexing stops
/// at the first character that is neither whitespace, a line ending nor a
/// single-line comment.
pub(crate) fn lex_leading_trivia(text: &str, language: Language) -> (Vec<Trivia>, usize) {
    let prefix = comment_prefix(language);
    let bytes = text.as_bytes();
    let mut trivia = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &text[pos..];
        match bytes[pos] {
            b' ' | b'\t' => {
                let len = rest
                    .find(|c: char| c != ' ' && c != '\t')
                    .unwrap_or(rest.len());
                trivia.push(Trivia::whitespace(&rest[..len]));
                pos += len;
            }
            b'\n' => {
                trivia.push(Trivia::end_of_line("\n"));
                pos += 1;
            }
            b'\r' if rest.starts_with("\r\n") => {
                trivia.push(Trivia::end_of_line("\r\n"));
                pos += 2;
            }
            _ if rest.starts_with(prefix) => {
                let len = rest.find(['\r', '\n']).unwrap_or(rest.len());
                trivia.push(Trivia::line_comment(&rest[..len]));
                pos += len;
            }
            _ => break,
        }
    }

    (trivia, pos)
}
