//! Degrading recovery around a merger invocation.
//!
//! Three levels, tried in order, so the caller always receives *something*:
//! the format-specific merge, plain ordered concatenation, and finally the
//! first fragment alone. The level actually used is reported so callers
//! needing guaranteed structural validity can check it alongside
//! `MergeResult::success`.

use crate::factory::MergerFactory;
use restitch_core::error::MergeError;
use restitch_core::format::{FormatDetection, FormatPreference, OutputFormat};
use restitch_core::fragment::Fragment;
use restitch_core::result::{FallbackLevel, MergeResult, MergedContent};
use std::sync::Arc;
use tracing::{debug, warn};

/// The chain's verdict: the merged result plus which recovery level and
/// format produced it.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub result: MergeResult,
    pub level: FallbackLevel,
    pub format: OutputFormat,
    /// Present when the format came from auto-detection.
    pub detection: Option<FormatDetection>,
}

/// Per-run wrapper over the shared merger factory.
pub struct FallbackChain {
    factory: Arc<MergerFactory>,
}

impl FallbackChain {
    pub fn new(factory: Arc<MergerFactory>) -> Self {
        Self { factory }
    }

    /// Merge the fragment sequence, degrading through the recovery levels on
    /// failure. The only error is [`MergeError::NoFragments`]: with zero
    /// fragments even best-effort recovery has nothing to return.
    pub fn merge(
        &self,
        preference: FormatPreference,
        fragments: &[Fragment],
    ) -> Result<FallbackOutcome, MergeError> {
        let first = fragments.first().ok_or(MergeError::NoFragments)?;

        let (merger, format, detection) = self.factory.resolve(preference, &first.content);
        debug!(%format, fragments = fragments.len(), "merging fragments");

        // Level 1: format-specific merge.
        let result = merger.merge(fragments);
        if result.success {
            return Ok(FallbackOutcome {
                result,
                level: FallbackLevel::None,
                format,
                detection,
            });
        }
        let failure = result
            .error
            .unwrap_or_else(|| "format-specific merge failed".into());
        warn!(%format, "format-specific merge failed, falling back to concatenation");

        // Level 2: plain ordered concatenation with single-newline joins.
        // Structurally this always succeeds, but the result is marked
        // unsuccessful to signal degraded quality.
        let joined = Self::concatenate(fragments);
        if !joined.is_empty() {
            return Ok(FallbackOutcome {
                result: MergeResult {
                    success: false,
                    content: MergedContent::Text(joined),
                    error: Some(failure),
                },
                level: FallbackLevel::Simplified,
                format,
                detection,
            });
        }
        warn!("no text to concatenate, returning first fragment as-is");

        // Level 3: the first fragment alone.
        Ok(FallbackOutcome {
            result: MergeResult {
                success: false,
                content: MergedContent::Text(first.content.clone()),
                error: Some(failure),
            },
            level: FallbackLevel::BestEffort,
            format,
            detection,
        })
    }

    fn concatenate(fragments: &[Fragment]) -> String {
        let mut out = String::new();
        for fragment in fragments {
            if out.is_empty() || fragment.content.is_empty() {
                out.push_str(&fragment.content);
                continue;
            }
            if !out.ends_with('\n') && !fragment.content.starts_with('\n') {
                out.push('\n');
            }
            out.push_str(&fragment.content);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restitch_core::fragment::CompletionReason;

    fn chain() -> FallbackChain {
        FallbackChain::new(Arc::new(MergerFactory::new()))
    }

    fn frag(content: &str) -> Fragment {
        Fragment::new(content, CompletionReason::Length)
    }

    #[test]
    fn no_fragments_is_the_one_fatal_condition() {
        let err = chain().merge(FormatPreference::Auto, &[]).unwrap_err();
        assert!(matches!(err, MergeError::NoFragments));
    }

    #[test]
    fn successful_merge_uses_level_none() {
        let outcome = chain()
            .merge(FormatPreference::Markup, &[frag("# Title\n"), frag("Body\n")])
            .unwrap();
        assert!(outcome.result.success);
        assert_eq!(outcome.level, FallbackLevel::None);
        assert_eq!(outcome.format, OutputFormat::Markup);
    }

    #[test]
    fn failed_structured_merge_degrades_to_concatenation() {
        // Unterminated string literal cannot be repaired; level 2 returns
        // the literal newline-joined fragment text.
        let fragments = [frag(r#"{"a": "unterminated"#)];
        let outcome = chain()
            .merge(FormatPreference::StructuredData, &fragments)
            .unwrap();
        assert!(!outcome.result.success);
        assert_eq!(outcome.level, FallbackLevel::Simplified);
        assert_eq!(
            outcome.result.content.as_text(),
            Some(r#"{"a": "unterminated"#)
        );
        assert!(outcome.result.error.is_some());
    }

    #[test]
    fn concatenation_joins_with_single_newline() {
        let joined = FallbackChain::concatenate(&[frag("a"), frag("b"), frag("c\n"), frag("d")]);
        assert_eq!(joined, "a\nb\nc\nd");
    }

    #[test]
    fn content_is_never_absent() {
        // Even an all-empty fragment sequence yields content (the empty
        // first fragment) rather than nothing.
        let outcome = chain()
            .merge(FormatPreference::StructuredData, &[frag(""), frag("")])
            .unwrap();
        assert_eq!(outcome.level, FallbackLevel::BestEffort);
        assert_eq!(outcome.result.content.as_text(), Some(""));
    }

    #[test]
    fn detection_reported_only_for_auto() {
        let explicit = chain()
            .merge(FormatPreference::Tabular, &[frag("a,b\n1,2\n")])
            .unwrap();
        assert!(explicit.detection.is_none());

        let auto = chain()
            .merge(FormatPreference::Auto, &[frag("a,b\n1,2\n2,3\n")])
            .unwrap();
        assert!(auto.detection.is_some());
    }
}
