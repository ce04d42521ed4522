//! Conditional compilation regions (`#if` / `#If ... Then`)

use crate::syntax::{Language, ParseOptions};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static VB_OR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(OrElse|Or)\b").expect("valid VB Or pattern"));
static VB_AND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(AndAlso|And)\b").expect("valid VB And pattern"));
static VB_NOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNot\b").expect("valid VB Not pattern"));
static VB_THEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+Then\s*$").expect("valid VB Then pattern"));

/// A conditional directive found on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive {
    If(String),
    Elif(String),
    Else,
    EndIf,
}

/// Classify a body line as a conditional directive
pub(crate) fn classify(line: &str, language: Language) -> Option<Directive> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('#')?.trim_start();
    let (keyword, expr) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };

    match language {
        Language::CSharp => match keyword {
            "if" => Some(Directive::If(strip_line_comment(expr).to_string())),
            "elif" => Some(Directive::Elif(strip_line_comment(expr).to_string())),
            "else" => Some(Directive::Else),
            "endif" => Some(Directive::EndIf),
            _ => None,
        },
        Language::VisualBasic => match keyword.to_ascii_lowercase().as_str() {
            "if" => Some(Directive::If(vb_to_expression(expr))),
            "elseif" => Some(Directive::Elif(vb_to_expression(expr))),
            "else" => Some(Directive::Else),
            "end" if expr.eq_ignore_ascii_case("if") => Some(Directive::EndIf),
            _ => None,
        },
    }
}

fn strip_line_comment(expr: &str) -> &str {
    match expr.find("//") {
        Some(idx) => expr[..idx].trim(),
        None => expr,
    }
}

/// Rewrite a VB condition into the `!`/`&&`/`||` form the evaluator reads
fn vb_to_expression(expr: &str) -> String {
    let expr = VB_THEN.replace(expr, "");
    let expr = VB_OR.replace_all(&expr, "||");
    let expr = VB_AND.replace_all(&expr, "&&");
    let expr = VB_NOT.replace_all(&expr, "!");
    expr.replace("<>", "!=")
        .replace("==", "=")
        .replace("!=", "\u{0}")
        .replace('=', "==")
        .replace('\u{0}', "!=")
}

/// Evaluate a preprocessor expression against the defined symbols
pub(crate) fn evaluate(expression: &str, options: &ParseOptions) -> bool {
    let expression = expression.trim();

    if let Some(idx) = find_logical_operator(expression, "||") {
        let left = &expression[..idx];
        let right = &expression[idx + 2..];
        return evaluate(left, options) || evaluate(right, options);
    }

    if let Some(idx) = find_logical_operator(expression, "&&") {
        let left = &expression[..idx];
        let right = &expression[idx + 2..];
        return evaluate(left, options) && evaluate(right, options);
    }

    if let Some(idx) = find_logical_operator(expression, "==") {
        return evaluate(&expression[..idx], options) == evaluate(&expression[idx + 2..], options);
    }

    if let Some(idx) = find_logical_operator(expression, "!=") {
        return evaluate(&expression[..idx], options) != evaluate(&expression[idx + 2..], options);
    }

    if let Some(rest) = expression.strip_prefix('!') {
        return !evaluate(rest, options);
    }

    if expression.starts_with('(') && expression.ends_with(')') {
        return evaluate(&expression[1..expression.len() - 1], options);
    }

    match expression.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" | "" => false,
        _ => options.is_defined(expression),
    }
}

/// Find an operator outside parentheses (byte offset)
fn find_logical_operator(s: &str, op: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let op = op.as_bytes();
    let mut depth = 0i32;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }

        if depth == 0 && bytes[i..].starts_with(op) {
            return Some(i);
        }
    }

    None
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    parent_active: bool,
    branch_taken: bool,
    active: bool,
}

/// Compute the body lines that sit inside inactive conditional branches
///
/// Directive lines themselves are never reported. Unbalanced `#endif`
/// directives are ignored; an unterminated `#if` extends to the end of the body.
pub(crate) fn disabled_lines(
    body: &str,
    language: Language,
    options: &ParseOptions,
) -> BTreeSet<usize> {
    let mut disabled = BTreeSet::new();
    let mut stack: Vec<Frame> = Vec::new();

    for (idx, line) in body.lines().enumerate() {
        let active = stack.last().map(|f| f.active).unwrap_or(true);

        match classify(line, language) {
            Some(Directive::If(expr)) => {
                let taken = active && evaluate(&expr, options);
                stack.push(Frame {
                    parent_active: active,
                    branch_taken: taken,
                    active: taken,
                });
            }
            Some(Directive::Elif(expr)) => {
                if let Some(frame) = stack.last_mut() {
                    let taken =
                        frame.parent_active && !frame.branch_taken && evaluate(&expr, options);
                    frame.active = taken;
                    frame.branch_taken |= taken;
                }
            }
            Some(Directive::Else) => {
                if let Some(frame) = stack.last_mut() {
                    frame.active = frame.parent_active && !frame.branch_taken;
                    frame.branch_taken = true;
                }
            }
            Some(Directive::EndIf) => {
                stack.pop();
            }
            None => {
                if !active {
                    disabled.insert(idx);
                }
            }
        }
    }

    disabled
}
