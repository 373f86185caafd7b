//! Restricted evaluator for arithmetic found in OCR text
//!
//! OCR output is untrusted. Text is reduced to digits, operators and
//! parentheses, then handed to a dedicated arithmetic grammar that has no
//! notion of names, calls or attributes. Every failure collapses to
//! "not simple" so nothing derived from the input escapes as an error.

mod answer;
pub mod parser;

use std::sync::LazyLock;

use regex::Regex;

pub use answer::pick_final_answer;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.+\-*/^()\s]").expect("valid regex"));
static OPERATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[+\-*/^]").expect("valid regex"));

/// Outcome of [`evaluate_if_simple`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionResult {
    pub is_simple: bool,
    pub value_text: String,
}

impl ExpressionResult {
    fn not_simple() -> Self {
        Self::default()
    }
}

/// Reduce free-form text to the characters the arithmetic grammar accepts.
///
/// Thousands separators are deleted (`1,000` -> `1000`); every other
/// disallowed character becomes a space so neighbouring digits never fuse.
pub fn clean_expression(text: &str) -> String {
    let without_commas = text.replace(',', "");
    DISALLOWED
        .replace_all(&without_commas, " ")
        .trim()
        .to_string()
}

/// Evaluate `text` when it holds a simple arithmetic expression.
///
/// A bare number is not simple math. `^` is read as exponentiation.
pub fn evaluate_if_simple(text: &str) -> ExpressionResult {
    let cleaned = clean_expression(text);
    if !OPERATOR.is_match(&cleaned) {
        return ExpressionResult::not_simple();
    }

    let expr = cleaned.replace('^', "**");
    match parser::parse(&expr).and_then(|tree| parser::eval(&tree)) {
        Ok(value) => ExpressionResult {
            is_simple: true,
            value_text: parser::format_number(value),
        },
        Err(err) => {
            log::debug!("Expression rejected: {err}");
            ExpressionResult::not_simple()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(text: &str) -> Option<String> {
        let result = evaluate_if_simple(text);
        if result.is_simple {
            Some(result.value_text)
        } else {
            assert!(result.value_text.is_empty());
            None
        }
    }

    #[test]
    fn caret_is_exponent() {
        assert_eq!(simple("2^10").as_deref(), Some("1024"));
    }

    #[test]
    fn division_keeps_decimal_form() {
        assert_eq!(simple("10 / 4").as_deref(), Some("2.5"));
    }

    #[test]
    fn thousands_separators_are_removed() {
        assert_eq!(simple("1,234 + 1").as_deref(), Some("1235"));
        assert_eq!(simple("1,000,000 * 2").as_deref(), Some("2000000"));
    }

    #[test]
    fn bare_numbers_are_not_simple() {
        assert_eq!(simple("42"), None);
        assert_eq!(simple("3.14159"), None);
        assert_eq!(simple("(7)"), None);
        assert_eq!(simple("no operator here 12"), None);
        assert_eq!(simple(""), None);
    }

    #[test]
    fn identifiers_are_rejected() {
        assert_eq!(simple("import os"), None);
        assert_eq!(simple("__import__('os').system('ls')"), None);
        assert_eq!(simple("exec"), None);
    }

    #[test]
    fn surrounding_words_are_dropped() {
        assert_eq!(simple("What is 12 * (3 + 4)?").as_deref(), Some("84"));
        assert_eq!(simple("Solve: 100 - 250 =").as_deref(), Some("-150"));
    }

    #[test]
    fn neighbouring_digits_do_not_fuse() {
        // "4x5" must not become "45"
        assert_eq!(simple("3 + 4x5"), None);
    }

    #[test]
    fn failures_say_nothing() {
        assert_eq!(simple("1 / 0"), None);
        assert_eq!(simple("2 +"), None);
        assert_eq!(simple("((1 + 2)"), None);
        assert_eq!(simple("5 - - -"), None);
    }

    #[test]
    fn inexact_integers_are_not_answered() {
        // 3^50 does not fit an i64; a rounded double would print wrong digits
        assert_eq!(simple("3^50"), None);
        assert_eq!(simple("3^39").as_deref(), Some("4052555153018976267"));
    }

    #[test]
    fn negative_and_nested() {
        assert_eq!(simple("((2 + 3) * (4 - 10))").as_deref(), Some("-30"));
        assert_eq!(simple("-3 - 4").as_deref(), Some("-7"));
    }

    #[test]
    fn clean_expression_keeps_only_arithmetic() {
        assert_eq!(clean_expression("  x = 1,500 / (2 + 1) ;"), "1500 / (2 + 1)");
    }
}
