//! Format detection heuristics.
//!
//! Classifies a text fragment as tabular, markup, or structured data, with a
//! confidence score. Used only when the caller asked for auto-detection; an
//! explicit format bypasses the detector entirely. Detection runs fresh per
//! run and is never cached across runs.

use crate::structured;
use crate::tabular;
use restitch_core::format::{FormatDetection, OutputFormat};
use tracing::debug;

/// Confidence for content that parses as strict data outright.
pub const STRUCTURED_CONFIDENCE: f32 = 0.98;
/// Confidence for a well-formed but truncated strict-data prefix.
pub const STRUCTURED_PARTIAL_CONFIDENCE: f32 = 0.9;
/// Minimum fraction of sampled lines matching the header's column count for
/// a tabular verdict.
pub const TABULAR_MIN_CONFIDENCE: f32 = 0.7;
/// Baseline confidence for the markup default.
pub const MARKUP_BASELINE_CONFIDENCE: f32 = 0.5;
/// How many leading non-blank lines the tabular heuristic samples.
const SAMPLE_LINES: usize = 10;

/// Stateless detector; safe to share across concurrent runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatDetector;

impl FormatDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify `content`. The first fragment of a run is sufficient and
    /// used by convention, since format is a property of the whole response.
    ///
    /// Priority-ordered heuristics, first confident match wins:
    /// 1. strict data — parses as JSON, or is a well-formed truncated prefix;
    /// 2. tabular — consistent delimiter counts across the leading lines;
    /// 3. markup — the least strict format, used as the default.
    pub fn detect(&self, content: &str) -> FormatDetection {
        if let Some(detection) = Self::detect_structured(content) {
            debug!(confidence = detection.confidence, "detected structured data");
            return detection;
        }
        if let Some(detection) = Self::detect_tabular(content) {
            debug!(confidence = detection.confidence, "detected tabular content");
            return detection;
        }
        FormatDetection::new(OutputFormat::Markup, MARKUP_BASELINE_CONFIDENCE)
    }

    fn detect_structured(content: &str) -> Option<FormatDetection> {
        let trimmed = content.trim();
        if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
            return None;
        }
        if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
            return Some(FormatDetection::new(
                OutputFormat::StructuredData,
                STRUCTURED_CONFIDENCE,
            ));
        }
        // A truncated run's first fragment never parses whole. A clean scan
        // with unmatched opens still identifies a strict-data prefix.
        let scan = structured::scan(trimmed);
        if scan.open_depth() > 0 || scan.in_string {
            return Some(FormatDetection::new(
                OutputFormat::StructuredData,
                STRUCTURED_PARTIAL_CONFIDENCE,
            ));
        }
        None
    }

    fn detect_tabular(content: &str) -> Option<FormatDetection> {
        let lines: Vec<&str> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(SAMPLE_LINES)
            .collect();
        if lines.len() < 2 {
            return None;
        }

        let delimiter = tabular::sniff_delimiter(lines[0])?;
        let expected = tabular::count_fields(lines[0], delimiter);
        if expected < 2 {
            return None;
        }

        // A separator line made of dashes/pipes counts as a match; the last
        // sampled line may be a truncated row, so it is not held against the
        // score.
        let last = lines.len() - 1;
        let matching = lines
            .iter()
            .enumerate()
            .filter(|(i, l)| {
                is_separator_line(l)
                    || tabular::count_fields(l, delimiter) == expected
                    || *i == last
            })
            .count();

        let confidence = matching as f32 / lines.len() as f32;
        if confidence >= TABULAR_MIN_CONFIDENCE {
            Some(FormatDetection::new(OutputFormat::Tabular, confidence))
        } else {
            None
        }
    }
}

/// A header separator line: dashes and pipes only (`---`, `|---|---|`).
fn is_separator_line(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '-' | '|' | ':' | ' '))
        && t.contains('-')
}
