use std::sync::LazyLock;

use regex::Regex;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d+(?:,\d{3})*(?:\.\d+)?").expect("valid regex"));

/// Pull the most likely final answer out of a model reply.
///
/// Scans non-blank lines from the end and returns the first number found
/// (sign, thousands groups and decimals kept as written). Without any number
/// the last non-blank line is returned verbatim.
pub fn pick_final_answer(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find_map(|l| NUMBER.find(l))
        .map(|m| m.as_str())
        .or_else(|| lines.last().copied())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_line_with_a_number_wins() {
        assert_eq!(pick_final_answer("line one\nresult: 42"), "42");
        assert_eq!(
            pick_final_answer("The answer is 7.\nHope that helps!"),
            "7"
        );
        assert_eq!(pick_final_answer("first 1\nthen 2\n\n  \n"), "2");
    }

    #[test]
    fn falls_back_to_last_non_blank_line() {
        assert_eq!(
            pick_final_answer("no numbers here\nstill none"),
            "still none"
        );
        assert_eq!(pick_final_answer("  padded  \n\n"), "padded");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(pick_final_answer(""), "");
        assert_eq!(pick_final_answer(" \n\t\n"), "");
    }

    #[test]
    fn keeps_sign_grouping_and_decimals() {
        assert_eq!(pick_final_answer("Total: -1,234,567.89 dollars"), "-1,234,567.89");
        assert_eq!(pick_final_answer("delta +3.5"), "+3.5");
        // the first number on the chosen line is returned
        assert_eq!(pick_final_answer("x = 3, y = 4"), "3");
    }
}
