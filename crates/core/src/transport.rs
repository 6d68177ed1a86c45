//! Transport trait — the abstraction over generation backends.
//!
//! A Transport knows how to send one generation request to an LLM and return
//! the resulting fragment with its completion reason and token usage. The
//! continuation engine only consumes this narrow surface; concrete HTTP
//! providers, retry policies for transient network failures, and streaming
//! all live behind it.

use crate::error::TransportError;
use crate::fragment::Fragment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structural context carried on a continuation request so the model resumes
/// coherently instead of restarting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationCue {
    /// Format-aware instruction describing what was mid-generation
    /// (e.g. "you were writing a table row").
    pub hint: String,

    /// Handle of the prior exchange, where the transport supports referencing
    /// it instead of re-sending full history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_exchange_id: Option<String>,
}

/// One generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportRequest {
    /// The model to use.
    pub model: String,

    /// The caller's prompt. Unchanged across continuation attempts; the
    /// continuation context travels in `continuation`.
    pub prompt: String,

    /// Maximum tokens to generate per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Present on every attempt after the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<ContinuationCue>,
}

impl TransportRequest {
    /// Create an initial request with no continuation context.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: None,
            continuation: None,
        }
    }

    /// Set the per-attempt token budget.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Derive the follow-up request for the next continuation attempt.
    pub fn continued(&self, cue: ContinuationCue) -> Self {
        let mut next = self.clone();
        next.continuation = Some(cue);
        next
    }
}

/// The generation transport consumed by the continuation controller.
///
/// Implementations must report `completion_reason` and token usage
/// truthfully; the engine cannot detect truncation if this signal is wrong.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A human-readable name for this transport (e.g. "anthropic", "mock").
    fn name(&self) -> &str;

    /// Send one request and await the resulting fragment.
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<Fragment, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::CompletionReason;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        fn name(&self) -> &str {
            "echo"
        }

        async fn send(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<Fragment, TransportError> {
            Ok(Fragment::new(request.prompt, CompletionReason::Stop))
        }
    }

    #[tokio::test]
    async fn transport_returns_fragment() {
        let t = EchoTransport;
        let fragment = t
            .send(TransportRequest::new("test-model", "hello"))
            .await
            .unwrap();
        assert_eq!(fragment.content, "hello");
        assert_eq!(fragment.completion_reason, CompletionReason::Stop);
    }

    #[test]
    fn continued_request_keeps_prompt() {
        let req = TransportRequest::new("m", "original prompt").with_max_tokens(256);
        let next = req.continued(ContinuationCue {
            hint: "continue the table".into(),
            previous_exchange_id: Some("msg_01".into()),
        });
        assert_eq!(next.prompt, "original prompt");
        assert_eq!(next.max_tokens, Some(256));
        let cue = next.continuation.unwrap();
        assert_eq!(cue.previous_exchange_id.as_deref(), Some("msg_01"));
    }
}
