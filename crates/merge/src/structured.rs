//! Merger for strict structured data (JSON-style nested maps/arrays).
//!
//! Truncation leaves unbalanced brackets, dangling separators, or a split
//! string literal. The scanner tracks bracket depth outside string literals
//! (with escape lookahead so `\"` does not toggle state), the tail is
//! classified to pick a join rule, and a best-effort repair pass balances
//! the result before the final parse. A failed parse never returns empty
//! data: the unrepaired concatenation is preserved for diagnostics.

use crate::contract::Merger;
use restitch_core::format::OutputFormat;
use restitch_core::fragment::Fragment;
use restitch_core::result::MergeResult;
use tracing::{debug, warn};

/// Bracket and string state after scanning a prefix of a JSON document.
pub(crate) struct JsonScan {
    /// Unmatched open brackets, outermost first.
    pub stack: Vec<char>,
    /// Whether the scan ended inside a string literal.
    pub in_string: bool,
}

impl JsonScan {
    pub fn open_depth(&self) -> usize {
        self.stack.len()
    }
}

/// Scan `content`, tracking `{`/`}` and `[`/`]` balance outside string
/// literals.
pub(crate) fn scan(content: &str) -> JsonScan {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in content.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => stack.push(ch),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    JsonScan { stack, in_string }
}

/// What the accumulated tail ends with, selecting the join rule for the next
/// fragment.
#[derive(Debug, PartialEq, Eq)]
enum TailContext {
    /// Ends with an open `{` or `[`.
    OpenBracket,
    /// Ends with a `,`.
    TrailingSeparator,
    /// Mid-array with unmatched opens.
    MidArray,
    /// Mid-object with unmatched opens.
    MidObject,
    /// Inside a string literal, after a `:`, or balanced; joined verbatim.
    Ambiguous,
}

fn classify_tail(content: &str) -> TailContext {
    let state = scan(content);
    if state.in_string {
        return TailContext::Ambiguous;
    }
    match content.chars().rev().find(|c| !c.is_whitespace()) {
        Some('{' | '[') => TailContext::OpenBracket,
        Some(',') => TailContext::TrailingSeparator,
        Some(':') => TailContext::Ambiguous,
        _ => match state.stack.last() {
            Some('[') => TailContext::MidArray,
            Some('{') => TailContext::MidObject,
            _ => TailContext::Ambiguous,
        },
    }
}

/// Replace typographic double quotes, which some models emit, with plain
/// ones so string boundaries scan correctly.
fn normalize_quotes(s: &str) -> String {
    s.replace(['\u{201C}', '\u{201D}'], "\"")
}

fn trim_trailing_separators(out: &mut String) {
    loop {
        out.truncate(out.trim_end().len());
        if out.ends_with(',') {
            out.pop();
        } else {
            break;
        }
    }
}

/// Best-effort structural repair: balance unclosed brackets and strip
/// dangling separators. A tail inside a string literal is not repairable;
/// guessing where the string was meant to end would fabricate data.
fn repair(joined: &str) -> Option<String> {
    let mut out = normalize_quotes(joined.trim());
    let state = scan(&out);
    if state.in_string {
        return None;
    }
    trim_trailing_separators(&mut out);
    for bracket in state.stack.iter().rev() {
        out.push(match bracket {
            '{' => '}',
            _ => ']',
        });
    }
    Some(out)
}

/// Merger for strict structured data.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDataMerger;

impl StructuredDataMerger {
    pub fn new() -> Self {
        Self
    }

    fn join(merged: &mut String, next: &str) {
        let context = classify_tail(merged);
        match context {
            TailContext::OpenBracket
            | TailContext::TrailingSeparator
            | TailContext::Ambiguous => merged.push_str(next),
            TailContext::MidArray | TailContext::MidObject => {
                // A new element with no separator on either side needs a
                // synthetic one; a fragment opening with a separator or a
                // closing bracket continues the structure as-is.
                match next.trim_start().chars().next() {
                    None => {}
                    Some(',' | '}' | ']') => merged.push_str(next),
                    Some(_) => {
                        debug!(?context, "inserting synthetic separator at fragment boundary");
                        merged.push(',');
                        merged.push_str(next);
                    }
                }
            }
        }
    }
}

impl Merger for StructuredDataMerger {
    fn format(&self) -> OutputFormat {
        OutputFormat::StructuredData
    }

    fn has_incomplete_structure(&self, content: &str) -> bool {
        let state = scan(content);
        state.open_depth() > 0 || state.in_string
    }

    fn merge(&self, fragments: &[Fragment]) -> MergeResult {
        let mut merged = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            let text = self.fragment_text(fragment);
            if i == 0 {
                merged.push_str(text);
            } else {
                Self::join(&mut merged, text);
            }
        }

        if let Ok(value) = serde_json::from_str(merged.trim()) {
            return MergeResult::value(value);
        }

        if let Some(repaired) = repair(&merged) {
            match serde_json::from_str(&repaired) {
                Ok(value) => {
                    debug!("structural repair produced valid data");
                    return MergeResult::value(value);
                }
                Err(e) => {
                    warn!(error = %e, "structured data still invalid after repair");
                    return MergeResult::failed(
                        merged.clone(),
                        format!("parse failed after repair: {e}; unrepaired content: {merged}"),
                    );
                }
            }
        }

        warn!("structured data tail is inside a string literal; not repairable");
        MergeResult::failed(
            merged.clone(),
            format!("unterminated string literal; unrepaired content: {merged}"),
        )
    }

    fn continuation_hint(&self, accumulated: &str) -> String {
        let state = scan(accumulated);
        let context = if state.in_string {
            "inside a string literal"
        } else {
            match state.stack.last() {
                Some('[') => "inside a JSON array",
                Some('{') => "inside a JSON object",
                _ => "at the end of a JSON document",
            }
        };
        format!(
            "The previous output is a JSON document that was cut off {context}. Continue \
             exactly where it stopped, emitting only the remaining JSON. Do not restart the \
             document, do not repeat content already produced, and do not wrap the output \
             in code fences or commentary."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restitch_core::fragment::CompletionReason;
    use serde_json::json;

    fn merge(texts: &[&str]) -> MergeResult {
        let fragments: Vec<Fragment> = texts
            .iter()
            .map(|t| Fragment::new(*t, CompletionReason::Length))
            .collect();
        StructuredDataMerger::new().merge(&fragments)
    }

    #[test]
    fn single_complete_fragment_parses() {
        let r = merge(&[r#"{"items": [{"id": 1}]}"#]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"items": [{"id": 1}]}));
    }

    #[test]
    fn split_array_rejoins() {
        let r = merge(&[r#"{"items":[{"id":1},{"id":2"#, r#"}]}"#]);
        assert!(r.success);
        assert_eq!(
            r.content.as_value().unwrap(),
            &json!({"items": [{"id": 1}, {"id": 2}]})
        );
    }

    #[test]
    fn split_string_literal_rejoins() {
        let r = merge(&[r#"{"a": "untermi"#, r#"nated"}"#]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"a": "unterminated"}));
    }

    #[test]
    fn synthetic_separator_between_elements() {
        let r = merge(&[r#"[{"a":1}"#, r#"{"b":2}]"#]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn no_separator_after_open_bracket() {
        let r = merge(&[r#"{"items":["#, "1,2]}"]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"items": [1, 2]}));
    }

    #[test]
    fn no_separator_after_trailing_comma() {
        let r = merge(&[r#"[1, 2,"#, " 3]"]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!([1, 2, 3]));
    }

    #[test]
    fn repair_closes_unbalanced_brackets() {
        let r = merge(&[r#"{"items": [1, 2"#]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"items": [1, 2]}));
    }

    #[test]
    fn repair_strips_dangling_separator() {
        let r = merge(&[r#"{"items": [1, 2,"#]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"items": [1, 2]}));
    }

    #[test]
    fn unterminated_string_fails_with_detail() {
        let raw = r#"{"a": "unterminated"#;
        let r = merge(&[raw]);
        assert!(!r.success);
        assert_eq!(r.content.as_text(), Some(raw));
        assert!(r.error.as_deref().unwrap().contains(raw));
    }

    #[test]
    fn escaped_quote_does_not_toggle_string_state() {
        let state = scan(r#"{"a": "say \"hi\"", "b": [1"#);
        assert!(!state.in_string);
        assert_eq!(state.stack, vec!['{', '[']);
    }

    #[test]
    fn incomplete_structure_detection() {
        let m = StructuredDataMerger::new();
        assert!(m.has_incomplete_structure(r#"{"a": [1, 2"#));
        assert!(m.has_incomplete_structure(r#"{"a": "open"#));
        assert!(!m.has_incomplete_structure(r#"{"a": 1}"#));
    }

    #[test]
    fn hint_names_the_open_structure() {
        let m = StructuredDataMerger::new();
        assert!(m.continuation_hint(r#"{"items": [1,"#).contains("JSON array"));
        assert!(m.continuation_hint(r#"{"a": {"#).contains("JSON object"));
        assert!(m.continuation_hint(r#"{"a": "mid"#).contains("string literal"));
    }

    #[test]
    fn typographic_quotes_are_normalized_in_repair() {
        let r = merge(&["{\u{201C}a\u{201D}: 1"]);
        assert!(r.success);
        assert_eq!(r.content.as_value().unwrap(), &json!({"a": 1}));
    }
}
