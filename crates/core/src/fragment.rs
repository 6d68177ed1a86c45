//! Fragment and ContinuationRun domain types.
//!
//! A Fragment is one unit of model-generated text received in a single
//! transport response. A ContinuationRun is the ordered sequence of fragments
//! for one logical request; it is owned exclusively by the controller while
//! the loop runs and becomes immutable once handed to the merge layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a continuation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the transport stopped generating.
///
/// `Length` and `Incomplete` signal truncation; every other reason is
/// terminal for the continuation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Natural end of generation.
    Stop,
    /// Output token budget exhausted mid-generation.
    Length,
    /// The model requested a tool invocation.
    ToolUse,
    /// Generation was cut by a content filter.
    ContentFilter,
    /// The provider reported an explicitly incomplete response.
    Incomplete,
    /// A transport error was recorded in place of a real reason.
    Error,
    /// The transport did not report a recognizable reason.
    Unknown,
}

impl CompletionReason {
    /// Whether this reason means generation was cut off and a continuation
    /// request may recover the rest.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Length | Self::Incomplete)
    }

    /// Whether this reason ends the continuation loop.
    pub fn is_terminal(&self) -> bool {
        !self.is_truncated()
    }
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolUse => "tool_use",
            Self::ContentFilter => "content_filter",
            Self::Incomplete => "incomplete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Token usage reported by the transport for one fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// One unit of generated content plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Raw text of this fragment.
    pub content: String,

    /// Why generation stopped for this fragment.
    pub completion_reason: CompletionReason,

    /// Token usage, if the transport reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Transport handle for this exchange, used to reference the prior
    /// response in a continuation request where the transport supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<String>,
}

impl Fragment {
    /// Create a fragment with the given content and completion reason.
    pub fn new(content: impl Into<String>, completion_reason: CompletionReason) -> Self {
        Self {
            content: content.into(),
            completion_reason,
            usage: None,
            exchange_id: None,
        }
    }

    /// Attach token usage.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach the transport's exchange handle.
    pub fn with_exchange_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_id = Some(id.into());
        self
    }

    /// Output tokens for this fragment, or 0 if usage was not reported.
    pub fn output_tokens(&self) -> u32 {
        self.usage.map(|u| u.output_tokens).unwrap_or(0)
    }
}

/// The ordered fragment sequence for one logical request.
///
/// Fragments are produced in strict sequence order and are never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationRun {
    /// Unique run id.
    pub id: RunId,

    /// When the run started.
    pub created_at: DateTime<Utc>,

    /// Fragments in receipt order.
    fragments: Vec<Fragment>,
}

impl ContinuationRun {
    /// Create a new empty run.
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            created_at: Utc::now(),
            fragments: Vec::new(),
        }
    }

    /// Append a fragment. Fragments are append-only; nothing removes or
    /// reorders them.
    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    /// Fragments in receipt order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The most recently received fragment.
    pub fn last(&self) -> Option<&Fragment> {
        self.fragments.last()
    }

    /// Number of fragments collected so far.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no fragments have been collected.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// All content accumulated so far, concatenated in receipt order with no
    /// separators. Used for structural inspection, not as a merge result.
    pub fn accumulated_text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .concat()
    }

    /// Finish the run and hand the immutable fragment sequence to the merge
    /// layer.
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }
}

impl Default for ContinuationRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_reasons() {
        assert!(CompletionReason::Length.is_truncated());
        assert!(CompletionReason::Incomplete.is_truncated());
        assert!(!CompletionReason::Stop.is_truncated());
        assert!(!CompletionReason::Error.is_truncated());
        assert!(CompletionReason::Stop.is_terminal());
    }

    #[test]
    fn fragment_builder() {
        let f = Fragment::new("hello", CompletionReason::Length)
            .with_usage(Usage::new(10, 5))
            .with_exchange_id("msg_01");
        assert_eq!(f.output_tokens(), 5);
        assert_eq!(f.exchange_id.as_deref(), Some("msg_01"));
    }

    #[test]
    fn run_preserves_order() {
        let mut run = ContinuationRun::new();
        run.push(Fragment::new("a", CompletionReason::Length));
        run.push(Fragment::new("b", CompletionReason::Stop));
        assert_eq!(run.len(), 2);
        assert_eq!(run.accumulated_text(), "ab");

        let frags = run.into_fragments();
        assert_eq!(frags[0].content, "a");
        assert_eq!(frags[1].content, "b");
    }

    #[test]
    fn completion_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CompletionReason::ContentFilter).unwrap();
        assert_eq!(json, "\"content_filter\"");
    }
}
