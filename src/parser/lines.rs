use std::sync::LazyLock;

use regex::Regex;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[SH]?\*?\s?\d+").unwrap());
static DATE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{2}").unwrap());

const SUMMARY_PREFIX: &str = "Summary:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Title,
    /// Text after `Summary:` on the same line.
    SummaryMarker(String),
    HistoryEntry {
        date_text: String,
        chamber: String,
        action: String,
    },
    UppercaseBlock,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub content: String,
    pub kind: LineKind,
}

pub fn classify_lines(text: &str) -> Vec<ClassifiedLine> {
    text.lines()
        .map(|line| ClassifiedLine {
            content: line.to_string(),
            kind: classify_line(line),
        })
        .collect()
}

/// Precedence: summary marker, history entry, title, uppercase body, plain.
/// A date-prefixed line without chamber + action is plain, never a title.
pub fn classify_line(line: &str) -> LineKind {
    if let Some(rest) = line.strip_prefix(SUMMARY_PREFIX) {
        return LineKind::SummaryMarker(rest.trim().to_string());
    }

    let trimmed = line.trim();
    if DATE_PREFIX_RE.is_match(trimmed) {
        return match split_history(trimmed) {
            Some((date_text, chamber, action)) => LineKind::HistoryEntry {
                date_text: date_text.to_string(),
                chamber: chamber.to_string(),
                action: action.to_string(),
            },
            None => {
                tracing::debug!(line = trimmed, "dropping history line without chamber/action");
                LineKind::Plain
            }
        };
    }

    if TITLE_RE.is_match(line) {
        return LineKind::Title;
    }

    if is_uppercase_block(trimmed) {
        return LineKind::UppercaseBlock;
    }

    LineKind::Plain
}

/// `date chamber action...`: the action keeps its inner spacing.
fn split_history(line: &str) -> Option<(&str, &str, &str)> {
    let (date_text, rest) = split_token(line)?;
    let (chamber, action) = split_token(rest)?;
    if action.is_empty() {
        return None;
    }
    Some((date_text, chamber, action))
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], s[end..].trim_start()))
}

/// At least one letter and no lowercase ones.
fn is_uppercase_block(s: &str) -> bool {
    s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_with_asterisk() {
        assert_eq!(classify_line("S*0001"), LineKind::Title);
        assert_eq!(classify_line("H 3456 General Bill"), LineKind::Title);
        assert_eq!(classify_line("0123"), LineKind::Title);
    }

    #[test]
    fn caption_beats_uppercase() {
        assert_eq!(classify_line("H 3456 GENERAL BILL"), LineKind::Title);
        assert_eq!(classify_line("GENERAL BILL H 3456"), LineKind::UppercaseBlock);
    }

    #[test]
    fn summary_marker_keeps_trailing_text() {
        assert_eq!(
            classify_line("Summary: Income tax credit"),
            LineKind::SummaryMarker("Income tax credit".to_string())
        );
        assert_eq!(classify_line("Summary:"), LineKind::SummaryMarker(String::new()));
    }

    #[test]
    fn marker_must_start_the_line() {
        assert_eq!(classify_line("  Summary: indented"), LineKind::Plain);
    }

    #[test]
    fn history_entry_fields() {
        let kind = classify_line("  12/04/24 Senate Introduced and adopted  ");
        assert_eq!(
            kind,
            LineKind::HistoryEntry {
                date_text: "12/04/24".to_string(),
                chamber: "Senate".to_string(),
                action: "Introduced and adopted".to_string(),
            }
        );
    }

    #[test]
    fn history_action_not_resplit() {
        let kind = classify_line("01/14/25 House  Referred to   Committee on Judiciary");
        assert!(matches!(kind, LineKind::HistoryEntry { chamber, action, .. }
            if chamber == "House" && action == "Referred to   Committee on Judiciary"));
    }

    #[test]
    fn malformed_history_is_plain() {
        assert_eq!(classify_line("12/04/24 Senate"), LineKind::Plain);
        assert_eq!(classify_line("12/04/24"), LineKind::Plain);
    }

    #[test]
    fn unparsable_date_still_classified() {
        assert!(matches!(classify_line("99/99/99 Senate Filed"), LineKind::HistoryEntry { .. }));
    }

    #[test]
    fn uppercase_and_plain() {
        assert_eq!(classify_line("EXAMPLE SUMMARY, FOR BILL 1."), LineKind::UppercaseBlock);
        assert_eq!(classify_line("A bill to amend the code"), LineKind::Plain);
        assert_eq!(classify_line(""), LineKind::Plain);
        assert_eq!(classify_line("--- 2024 ---"), LineKind::Plain);
    }

    #[test]
    fn classify_preserves_content() {
        let lines = classify_lines("S*0001\nSummary:\n  EXAMPLE  ");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].content, "  EXAMPLE  ");
        assert_eq!(lines[2].kind, LineKind::UppercaseBlock);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(classify_lines("").is_empty());
    }
}
