//! Output format classification types.

use serde::{Deserialize, Serialize};

/// The structural grammar of a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Delimiter-separated rows (CSV-style).
    Tabular,
    /// Lightly structured markup (headings, tables, fenced code blocks).
    Markup,
    /// Strict data interchange (JSON-style nested maps/arrays).
    StructuredData,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tabular => "tabular",
            Self::Markup => "markup",
            Self::StructuredData => "structured_data",
        };
        write!(f, "{s}")
    }
}

/// Caller-facing format preference: an explicit format or auto-detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatPreference {
    Tabular,
    Markup,
    StructuredData,
    #[default]
    Auto,
}

impl FormatPreference {
    /// The explicit format, if this preference names one. `Auto` defers to
    /// the detector.
    pub fn as_explicit(&self) -> Option<OutputFormat> {
        match self {
            Self::Tabular => Some(OutputFormat::Tabular),
            Self::Markup => Some(OutputFormat::Markup),
            Self::StructuredData => Some(OutputFormat::StructuredData),
            Self::Auto => None,
        }
    }
}

/// The detector's verdict for one run. Produced fresh per run and never
/// cached across runs; content shape can legitimately vary run to run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatDetection {
    pub format: OutputFormat,
    /// Confidence in [0, 1].
    pub confidence: f32,
}

impl FormatDetection {
    pub fn new(format: OutputFormat, confidence: f32) -> Self {
        Self {
            format,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_maps_to_explicit_format() {
        assert_eq!(
            FormatPreference::Tabular.as_explicit(),
            Some(OutputFormat::Tabular)
        );
        assert_eq!(FormatPreference::Auto.as_explicit(), None);
    }

    #[test]
    fn detection_clamps_confidence() {
        let d = FormatDetection::new(OutputFormat::Markup, 1.5);
        assert!((d.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn format_serializes_snake_case() {
        let json = serde_json::to_string(&OutputFormat::StructuredData).unwrap();
        assert_eq!(json, "\"structured_data\"");
    }
}
