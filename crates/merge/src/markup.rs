//! Merger for lightly structured markup (headings, tables, fenced code
//! blocks, ordered lists).
//!
//! The two structures truncation actually corrupts are pipe tables and
//! fenced code blocks, so those drive the join rules. Ordered-list numbering
//! is deliberately not rewritten here; the continuation hint asks the model
//! for correct numbering and the merger only guarantees no structural
//! corruption.

use crate::contract::Merger;
use restitch_core::format::OutputFormat;
use restitch_core::fragment::Fragment;
use restitch_core::result::MergeResult;
use tracing::debug;

/// The fence character of an unclosed code fence, if any. A fence of the
/// other character inside an open block is literal content, not a closer.
fn open_fence(content: &str) -> Option<char> {
    let mut open: Option<char> = None;
    for line in content.lines() {
        let t = line.trim_start();
        let marker = if t.starts_with("```") {
            Some('`')
        } else if t.starts_with("~~~") {
            Some('~')
        } else {
            None
        };
        if let Some(m) = marker {
            match open {
                None => open = Some(m),
                Some(o) if o == m => open = None,
                Some(_) => {}
            }
        }
    }
    open
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Number of cells in a pipe-table row.
fn cell_count(line: &str) -> usize {
    line.trim().trim_matches('|').split('|').count()
}

fn last_nonblank_line(content: &str) -> Option<&str> {
    content.lines().rev().find(|l| !l.trim().is_empty())
}

/// Header and separator lines of the pipe table the content currently ends
/// inside, if its tail is a table.
fn tail_table_header(content: &str) -> Option<(&str, &str)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut end = lines.len();
    while end > 0 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    if end == 0 || !is_table_row(lines[end - 1]) {
        return None;
    }
    let mut start = end - 1;
    while start > 0 && is_table_row(lines[start - 1]) {
        start -= 1;
    }
    if end - start < 2 {
        return None;
    }
    Some((lines[start], lines[start + 1]))
}

/// The last non-blank line is a table row cut off before its closing marker
/// or short of the header's cell count. Checked regardless of a trailing
/// newline; truncation can land just after a line break.
fn incomplete_table_row(content: &str) -> bool {
    let Some(last) = last_nonblank_line(content) else {
        return false;
    };
    if !is_table_row(last) {
        return false;
    }
    if !last.trim_end().ends_with('|') {
        return true;
    }
    match tail_table_header(content) {
        Some((header, _)) => cell_count(last) != cell_count(header),
        None => false,
    }
}

/// Trailing ordered-list item number, if the content ends mid-list.
fn tail_list_number(content: &str) -> Option<u32> {
    let line = last_nonblank_line(content)?.trim_start();
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = &line[digits.len()..];
    if rest.starts_with(". ") || rest.starts_with(") ") {
        digits.parse().ok()
    } else {
        None
    }
}

/// Append `b` to `a` with a single newline, unless either side already
/// provides one. Avoids both blank-line inflation and line-gluing.
fn join_with_newline(a: &mut String, b: &str) {
    if !a.is_empty() && !b.is_empty() && !a.ends_with('\n') && !b.starts_with('\n') {
        a.push('\n');
    }
    a.push_str(b);
}

/// Merger for lightly structured markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupMerger;

impl MarkupMerger {
    pub fn new() -> Self {
        Self
    }

    /// Drop a repeated table header + separator pair from the front of a
    /// continuation fragment, when the accumulated tail is inside a table.
    fn strip_repeated_table_header<'a>(merged: &str, next: &'a str) -> &'a str {
        let Some((header, separator)) = tail_table_header(merged) else {
            return next;
        };
        let mut lines = next.lines();
        let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
            return next;
        };
        if first.trim_end() == header.trim_end() && second.trim_end() == separator.trim_end() {
            debug!("stripping repeated table header and separator");
            // Skip by byte position rather than line length: `lines()`
            // strips `\r`, so CRLF input would slice short.
            let after_first = match next.find('\n') {
                Some(i) => &next[i + 1..],
                None => return "",
            };
            return match after_first.find('\n') {
                Some(i) => &after_first[i + 1..],
                None => "",
            };
        }
        next
    }

    /// Drop a duplicate opening fence from the front of a continuation
    /// fragment, only if its first line is a fence marker matching the one
    /// currently open.
    fn strip_repeated_fence<'a>(next: &'a str, open: char) -> &'a str {
        let Some(first) = next.lines().next() else {
            return next;
        };
        let marker: String = std::iter::repeat_n(open, 3).collect();
        if first.trim_start().starts_with(&marker) {
            debug!("stripping repeated opening fence");
            return match next.find('\n') {
                Some(idx) => &next[idx + 1..],
                None => "",
            };
        }
        next
    }
}

impl Merger for MarkupMerger {
    fn format(&self) -> OutputFormat {
        OutputFormat::Markup
    }

    fn has_incomplete_structure(&self, content: &str) -> bool {
        open_fence(content).is_some() || incomplete_table_row(content)
    }

    fn merge(&self, fragments: &[Fragment]) -> MergeResult {
        let mut merged = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            let text = self.fragment_text(fragment);
            if i == 0 {
                merged.push_str(text);
                continue;
            }

            if incomplete_table_row(&merged) {
                // The row must complete on the same line.
                merged.push_str(text);
            } else if let Some(open) = open_fence(&merged) {
                let text = Self::strip_repeated_fence(text, open);
                join_with_newline(&mut merged, text);
            } else {
                let text = Self::strip_repeated_table_header(&merged, text);
                join_with_newline(&mut merged, text);
            }
        }
        MergeResult::text(merged)
    }

    fn continuation_hint(&self, accumulated: &str) -> String {
        if let Some(open) = open_fence(accumulated) {
            let marker: String = std::iter::repeat_n(open, 3).collect();
            format!(
                "The previous output was cut off inside a fenced code block opened with \
                 `{marker}`. Continue the code exactly where it stopped and close the block \
                 with a matching `{marker}` fence when the code is complete. Do not open a \
                 new fence and do not repeat code already produced."
            )
        } else if incomplete_table_row(accumulated) {
            "The previous output was cut off while writing a table row. Continue exactly \
             where it stopped, completing the current row first. Do not repeat the table \
             header, the separator line, or any rows already produced."
                .to_string()
        } else if let Some(n) = tail_list_number(accumulated) {
            format!(
                "The previous output was cut off inside a numbered list; the last item was \
                 number {n}. Continue the list starting at item {}. Do not repeat items \
                 already produced.",
                n + 1
            )
        } else {
            "The previous output was cut off mid-document. Continue exactly where it \
             stopped. Do not repeat any content already produced."
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restitch_core::fragment::CompletionReason;

    fn merge(texts: &[&str]) -> String {
        let fragments: Vec<Fragment> = texts
            .iter()
            .map(|t| Fragment::new(*t, CompletionReason::Length))
            .collect();
        let result = MarkupMerger::new().merge(&fragments);
        assert!(result.success);
        result.content.to_text()
    }

    #[test]
    fn single_fragment_identity() {
        for content in ["# Title\n\nBody text.\n", "", "no newline"] {
            assert_eq!(merge(&[content]), content);
        }
    }

    #[test]
    fn code_fence_completes_without_duplication() {
        let merged = merge(&["```rb\ndef a\n", "  1\nend\n```"]);
        assert_eq!(merged, "```rb\ndef a\n  1\nend\n```");
        assert_eq!(merged.matches("```").count(), 2);
    }

    #[test]
    fn repeated_opening_fence_is_stripped() {
        let merged = merge(&["```py\nx = 1\n", "```py\ny = 2\n```\n"]);
        assert_eq!(merged, "```py\nx = 1\ny = 2\n```\n");
    }

    #[test]
    fn tilde_fence_inside_backtick_fence_is_content() {
        assert_eq!(open_fence("```\n~~~\ntext\n"), Some('`'));
        assert_eq!(open_fence("```\ncode\n```\n"), None);
    }

    #[test]
    fn incomplete_table_row_concatenates_directly() {
        let merged = merge(&["| id | name |\n|----|------|\n| 1 | Ali", "ce |\n| 2 | Bob |\n"]);
        assert_eq!(
            merged,
            "| id | name |\n|----|------|\n| 1 | Alice |\n| 2 | Bob |\n"
        );
    }

    #[test]
    fn repeated_table_header_is_stripped() {
        let merged = merge(&[
            "| id | name |\n|----|------|\n| 1 | Alice |\n",
            "| id | name |\n|----|------|\n| 2 | Bob |\n",
        ]);
        assert_eq!(
            merged,
            "| id | name |\n|----|------|\n| 1 | Alice |\n| 2 | Bob |\n"
        );
        assert_eq!(merged.matches("| id | name |").count(), 1);
    }

    #[test]
    fn repeated_table_header_stripped_with_crlf_endings() {
        let merged = merge(&[
            "| id | name |\r\n|----|------|\r\n| 1 | Alice |\r\n",
            "| id | name |\r\n|----|------|\r\n| 2 | Bob |\r\n",
        ]);
        assert_eq!(
            merged,
            "| id | name |\r\n|----|------|\r\n| 1 | Alice |\r\n| 2 | Bob |\r\n"
        );
        assert_eq!(merged.matches("| id | name |").count(), 1);
    }

    #[test]
    fn incomplete_row_detected_despite_trailing_newline() {
        let m = MarkupMerger::new();
        let content = "| a | b |\n|---|---|\n| 1 | x\n";
        assert!(m.has_incomplete_structure(content));
        assert!(m.continuation_hint(content).contains("table row"));
    }

    #[test]
    fn plain_fragments_join_with_single_newline() {
        assert_eq!(merge(&["one", "two"]), "one\ntwo");
        assert_eq!(merge(&["one\n", "two"]), "one\ntwo");
        assert_eq!(merge(&["one\n", "\ntwo"]), "one\n\ntwo");
    }

    #[test]
    fn incomplete_structure_detection() {
        let m = MarkupMerger::new();
        assert!(m.has_incomplete_structure("```\ncode\n"));
        assert!(!m.has_incomplete_structure("```\ncode\n```\n"));
        assert!(m.has_incomplete_structure("| a | b |\n|---|---|\n| 1 | tw"));
        assert!(!m.has_incomplete_structure("| a | b |\n|---|---|\n| 1 | 2 |\n"));
        assert!(!m.has_incomplete_structure("plain prose\n"));
    }

    #[test]
    fn hint_for_open_fence() {
        let hint = MarkupMerger::new().continuation_hint("```rs\nfn main() {\n");
        assert!(hint.contains("fenced code block"));
        assert!(hint.contains("```"));
    }

    #[test]
    fn hint_for_numbered_list() {
        let hint = MarkupMerger::new().continuation_hint("Steps:\n1. first\n2. second\n");
        assert!(hint.contains("item 3"));
    }

    #[test]
    fn hint_for_table_row() {
        let hint = MarkupMerger::new().continuation_hint("| a | b |\n|---|---|\n| 1 | tw");
        assert!(hint.contains("table row"));
    }

    #[test]
    fn list_numbering_is_not_rewritten() {
        // Renumbering is the hint's job; the merger must keep text verbatim.
        let merged = merge(&["1. alpha\n2. beta\n", "2. gamma\n"]);
        assert_eq!(merged, "1. alpha\n2. beta\n2. gamma\n");
    }
}
