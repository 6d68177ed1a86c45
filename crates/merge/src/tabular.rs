//! Merger for delimiter-separated rows (CSV-style output).
//!
//! Truncation can land mid-field, inside a quoted value, or even inside a
//! quoted value that spans lines. The scanner tracks quote state across
//! fragment boundaries so delimiters and record terminators inside quotes
//! are never treated as structure.

use crate::contract::Merger;
use restitch_core::format::OutputFormat;
use restitch_core::fragment::Fragment;
use restitch_core::result::MergeResult;
use tracing::{debug, warn};

const CANDIDATE_DELIMITERS: [char; 4] = [',', '\t', ';', '|'];

/// Pick the most plausible field delimiter for a header line, counting only
/// occurrences outside quotes. Returns None if no candidate appears.
pub(crate) fn sniff_delimiter(line: &str) -> Option<char> {
    CANDIDATE_DELIMITERS
        .iter()
        .map(|&d| (d, count_outside_quotes(line, d)))
        .filter(|&(_, n)| n > 0)
        .max_by_key(|&(_, n)| n)
        .map(|(d, _)| d)
}

/// Number of fields in a row for the given delimiter, quote-aware.
pub(crate) fn count_fields(line: &str, delimiter: char) -> usize {
    count_outside_quotes(line, delimiter) + 1
}

fn count_outside_quotes(line: &str, target: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == target && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Splits a character stream into rows, honoring quoted fields that contain
/// delimiters or record terminators. State survives across `feed` calls so a
/// fragment boundary inside a quoted field is handled correctly.
struct RowScanner {
    rows: Vec<String>,
    partial: String,
    in_quotes: bool,
}

impl RowScanner {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            partial: String::new(),
            in_quotes: false,
        }
    }

    /// Whether the scanned text so far ends exactly on a row boundary.
    fn at_row_boundary(&self) -> bool {
        self.partial.is_empty() && !self.in_quotes
    }

    fn feed(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '"' => {
                    self.in_quotes = !self.in_quotes;
                    self.partial.push(ch);
                }
                '\n' if !self.in_quotes => {
                    self.rows.push(std::mem::take(&mut self.partial));
                }
                _ => self.partial.push(ch),
            }
        }
    }
}

fn rows_equal(a: &str, b: &str) -> bool {
    a.trim_end_matches('\r') == b.trim_end_matches('\r')
}

/// Merger for delimiter-separated tabular text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularMerger;

impl TabularMerger {
    pub fn new() -> Self {
        Self
    }

    fn scan(content: &str) -> RowScanner {
        let mut scanner = RowScanner::new();
        scanner.feed(content);
        scanner
    }
}

impl Merger for TabularMerger {
    fn format(&self) -> OutputFormat {
        OutputFormat::Tabular
    }

    fn has_incomplete_structure(&self, content: &str) -> bool {
        if content.is_empty() {
            return false;
        }
        let scanner = Self::scan(content);
        if scanner.in_quotes {
            // Trailing unterminated quoted field.
            return true;
        }
        if !scanner.partial.is_empty() {
            // Final line lacks its record terminator.
            return true;
        }
        // Trailing delimiter with no following value.
        match (scanner.rows.last(), content.lines().next()) {
            (Some(last), Some(header)) => sniff_delimiter(header)
                .is_some_and(|d| last.trim_end_matches('\r').ends_with(d)),
            _ => false,
        }
    }

    fn merge(&self, fragments: &[Fragment]) -> MergeResult {
        let mut scanner = RowScanner::new();
        let mut header: Option<String> = None;

        for (i, fragment) in fragments.iter().enumerate() {
            let text = self.fragment_text(fragment);
            let clean_boundary = scanner.at_row_boundary();
            let rows_before = scanner.rows.len();

            scanner.feed(text);

            if i == 0 {
                header = scanner.rows.first().cloned();
                continue;
            }

            // A continuation that re-emits the header gets it stripped, but
            // only when the previous fragment ended on a row boundary; a
            // held-back partial row always absorbs the leading text instead.
            if clean_boundary
                && let Some(h) = &header
                && scanner.rows.len() > rows_before
                && rows_equal(&scanner.rows[rows_before], h)
            {
                debug!(fragment = i, "stripping repeated header row");
                scanner.rows.remove(rows_before);
            }
        }

        // Column-count consistency is checked but not enforced: a mismatched
        // row is kept, since dropping data silently is worse than slightly
        // malformed output.
        if let Some(h) = &header
            && let Some(delimiter) = sniff_delimiter(h)
        {
            let expected = count_fields(h, delimiter);
            for (i, row) in scanner.rows.iter().enumerate().skip(1) {
                if row.trim().is_empty() {
                    continue;
                }
                let found = count_fields(row, delimiter);
                if found != expected {
                    warn!(row = i, expected, found, "row column count differs from header");
                }
            }
        }

        let mut out = scanner.rows.join("\n");
        if !scanner.rows.is_empty() {
            out.push('\n');
        }
        if !scanner.partial.is_empty() {
            // Trailing incomplete row is kept verbatim, without a terminator.
            out.push_str(&scanner.partial);
        }
        MergeResult::text(out)
    }

    fn continuation_hint(&self, accumulated: &str) -> String {
        let scanner = Self::scan(accumulated);
        if scanner.in_quotes {
            "The previous output is a delimiter-separated table that was cut off inside a \
             quoted field. Continue exactly where it stopped: finish the quoted value, close \
             the quote, and complete the current row before emitting further rows. Do not \
             repeat the header or any rows already produced."
                .to_string()
        } else if !scanner.partial.is_empty() {
            format!(
                "The previous output is a delimiter-separated table that was cut off mid-row. \
                 The unfinished row so far is `{}`. Continue exactly where it stopped, \
                 completing that row first. Do not repeat the header or any rows already \
                 produced.",
                scanner.partial
            )
        } else {
            "The previous output is a delimiter-separated table that was cut off at a row \
             boundary. Continue with the next row. Do not repeat the header or any rows \
             already produced."
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restitch_core::fragment::CompletionReason;

    fn frag(content: &str, reason: CompletionReason) -> Fragment {
        Fragment::new(content, reason)
    }

    fn merge(texts: &[&str]) -> String {
        let fragments: Vec<Fragment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let reason = if i == texts.len() - 1 {
                    CompletionReason::Stop
                } else {
                    CompletionReason::Length
                };
                frag(t, reason)
            })
            .collect();
        let result = TabularMerger::new().merge(&fragments);
        assert!(result.success);
        result.content.to_text()
    }

    #[test]
    fn single_fragment_identity() {
        for content in ["id,name\n1,Alice\n", "no trailing newline", "", "\n"] {
            assert_eq!(merge(&[content]), content, "content: {content:?}");
        }
    }

    #[test]
    fn completes_split_row() {
        let merged = merge(&["id,name\n1,Alice\n2,Bo", "b\n3,Carol\n"]);
        assert_eq!(merged, "id,name\n1,Alice\n2,Bob\n3,Carol\n");
    }

    #[test]
    fn strips_repeated_header() {
        let merged = merge(&["id,name\n1,Alice\n", "id,name\n2,Bob\n"]);
        assert_eq!(merged, "id,name\n1,Alice\n2,Bob\n");
        assert_eq!(merged.matches("id,name").count(), 1);
    }

    #[test]
    fn header_not_stripped_mid_row() {
        // A partial row absorbs the continuation's leading text, even if the
        // completed row happens to equal the header.
        let merged = merge(&["id,name\n1,Alice\nid,", "name\n2,Bob\n"]);
        assert_eq!(merged, "id,name\n1,Alice\nid,name\n2,Bob\n");
    }

    #[test]
    fn quoted_delimiter_is_not_structure() {
        let merged = merge(&["id,name\n1,\"Smith, Alice\"\n2,Bo", "b\n"]);
        assert_eq!(merged, "id,name\n1,\"Smith, Alice\"\n2,Bob\n");
    }

    #[test]
    fn quoted_field_spanning_fragments() {
        let merged = merge(&["id,note\n1,\"line one\nline tw", "o\"\n2,plain\n"]);
        assert_eq!(merged, "id,note\n1,\"line one\nline two\"\n2,plain\n");
    }

    #[test]
    fn trailing_partial_row_is_kept() {
        let merged = merge(&["id,name\n1,Alice\n2,Bo"]);
        assert_eq!(merged, "id,name\n1,Alice\n2,Bo");
    }

    #[test]
    fn mismatched_column_count_kept() {
        let merged = merge(&["a,b\n1,2\n", "3,4,5\n"]);
        assert!(merged.contains("3,4,5"));
    }

    #[test]
    fn incomplete_structure_detection() {
        let m = TabularMerger::new();
        assert!(m.has_incomplete_structure("a,b\n1,\"unterminated\n"));
        assert!(m.has_incomplete_structure("a,b\n1,2"));
        assert!(m.has_incomplete_structure("a,b\n1,\n"));
        assert!(!m.has_incomplete_structure("a,b\n1,2\n"));
        assert!(!m.has_incomplete_structure(""));
    }

    #[test]
    fn hint_mentions_partial_row() {
        let hint = TabularMerger::new().continuation_hint("a,b\n1,Ali");
        assert!(hint.contains("1,Ali"));
        assert!(hint.contains("Do not repeat the header"));
    }

    #[test]
    fn hint_at_row_boundary() {
        let hint = TabularMerger::new().continuation_hint("a,b\n1,2\n");
        assert!(hint.contains("row boundary"));
    }

    #[test]
    fn sniffs_common_delimiters() {
        assert_eq!(sniff_delimiter("a,b,c"), Some(','));
        assert_eq!(sniff_delimiter("a\tb\tc"), Some('\t'));
        assert_eq!(sniff_delimiter("| a | b |"), Some('|'));
        assert_eq!(sniff_delimiter("plain text"), None);
        // Quoted delimiters do not count
        assert_eq!(sniff_delimiter("\"a,b\"|c"), Some('|'));
    }
}
