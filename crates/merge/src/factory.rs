//! Merger selection.
//!
//! Holds a format → implementation map rather than a class hierarchy; an
//! explicit format bypasses detection, auto-detection runs on the first
//! fragment.

use crate::contract::Merger;
use crate::detector::FormatDetector;
use crate::markup::MarkupMerger;
use crate::structured::StructuredDataMerger;
use crate::tabular::TabularMerger;
use restitch_core::format::{FormatDetection, FormatPreference, OutputFormat};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Minimum detector confidence for a usable auto-detection verdict. Below
/// this the least-strict format (markup) is used instead of failing.
pub const DETECTION_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Stateless registry of the three format mergers; safe to share across
/// concurrent runs.
pub struct MergerFactory {
    mergers: HashMap<OutputFormat, Arc<dyn Merger>>,
    detector: FormatDetector,
}

impl MergerFactory {
    pub fn new() -> Self {
        let mut mergers: HashMap<OutputFormat, Arc<dyn Merger>> = HashMap::new();
        mergers.insert(OutputFormat::Tabular, Arc::new(TabularMerger::new()));
        mergers.insert(OutputFormat::Markup, Arc::new(MarkupMerger::new()));
        mergers.insert(
            OutputFormat::StructuredData,
            Arc::new(StructuredDataMerger::new()),
        );
        Self {
            mergers,
            detector: FormatDetector::new(),
        }
    }

    /// The merger for an explicit format.
    pub fn for_format(&self, format: OutputFormat) -> Arc<dyn Merger> {
        // Every OutputFormat variant is registered in `new`.
        Arc::clone(&self.mergers[&format])
    }

    /// Resolve a merger from the caller's preference, detecting on the first
    /// fragment's content when the preference is `Auto`. Returns the merger,
    /// the format it handles, and the detection verdict when one was run.
    pub fn resolve(
        &self,
        preference: FormatPreference,
        first_fragment: &str,
    ) -> (Arc<dyn Merger>, OutputFormat, Option<FormatDetection>) {
        if let Some(format) = preference.as_explicit() {
            return (self.for_format(format), format, None);
        }

        let detection = self.detector.detect(first_fragment);
        let format = if detection.confidence < DETECTION_CONFIDENCE_THRESHOLD {
            debug!(
                detected = %detection.format,
                confidence = detection.confidence,
                "detection ambiguous, defaulting to markup"
            );
            OutputFormat::Markup
        } else {
            detection.format
        };
        (self.for_format(format), format, Some(detection))
    }
}

impl Default for MergerFactory {
    fn default() -> Self {
        Self::new()
    }
}
