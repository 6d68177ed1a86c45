//! Merge result types.

use serde::{Deserialize, Serialize};

/// Which recovery level of the fallback chain produced the final result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    /// The format-specific merger succeeded directly.
    #[default]
    None,
    /// Plain ordered concatenation with single-newline joins.
    Simplified,
    /// The first fragment alone, when nothing better could be produced.
    BestEffort,
}

impl std::fmt::Display for FallbackLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Simplified => "simplified",
            Self::BestEffort => "best_effort",
        };
        write!(f, "{s}")
    }
}

/// The merged artifact: raw text for tabular/markup, a parsed value for
/// structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MergedContent {
    Text(String),
    Value(serde_json::Value),
}

impl MergedContent {
    /// Borrow as text, if this is the text variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Value(_) => None,
        }
    }

    /// Borrow as a parsed value, if this is the value variant.
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Text(_) => None,
            Self::Value(v) => Some(v),
        }
    }

    /// Render as text regardless of variant. Structured values are
    /// serialized compactly.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Value(v) => v.to_string(),
        }
    }
}

/// The outcome of merging one fragment sequence.
///
/// `success == false` still carries content: either the best concatenation
/// the fallback chain could produce, or (for structured data) the unrepaired
/// text preserved in `error` for diagnostics. Nothing is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Whether the format-specific merge produced structurally valid output.
    pub success: bool,

    /// The merged artifact.
    pub content: MergedContent,

    /// Diagnostic detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MergeResult {
    /// A successful text merge.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: MergedContent::Text(content.into()),
            error: None,
        }
    }

    /// A successful structured-data merge.
    pub fn value(value: serde_json::Value) -> Self {
        Self {
            success: true,
            content: MergedContent::Value(value),
            error: None,
        }
    }

    /// A failed merge that still carries its best-available content.
    pub fn failed(content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: MergedContent::Text(content.into()),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_result_is_successful() {
        let r = MergeResult::text("a,b\n1,2\n");
        assert!(r.success);
        assert_eq!(r.content.as_text(), Some("a,b\n1,2\n"));
        assert!(r.error.is_none());
    }

    #[test]
    fn failed_result_keeps_content() {
        let r = MergeResult::failed("{\"a\": 1", "unbalanced braces");
        assert!(!r.success);
        assert_eq!(r.content.as_text(), Some("{\"a\": 1"));
        assert_eq!(r.error.as_deref(), Some("unbalanced braces"));
    }

    #[test]
    fn value_result_round_trips() {
        let r = MergeResult::value(serde_json::json!({"items": [1, 2]}));
        assert!(r.success);
        assert_eq!(r.content.to_text(), "{\"items\":[1,2]}");
    }
}
