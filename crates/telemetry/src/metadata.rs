//! Continuation run metadata.
//!
//! The accumulator is pure record-keeping: the controller appends to it as
//! the loop runs, and `finalize` computes the derived fields. It retries
//! nothing and has no side effects of its own.

use crate::pricing::PricingTable;
use chrono::{DateTime, Utc};
use restitch_core::format::OutputFormat;
use restitch_core::fragment::{CompletionReason, Fragment};
use restitch_core::result::FallbackLevel;
use serde::{Deserialize, Serialize};

/// The finalized record for one continuation run, handed to observability
/// and persistence collaborators. Append-only during the run; immutable
/// after `finalize`.
///
/// Invariant: `fragment_sizes`, `completion_reasons` and `attempt_count`
/// agree — every attempt, including failed ones, contributes one entry to
/// each list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationMetadata {
    /// Run id, matching the controller's `ContinuationRun`.
    pub run_id: String,
    /// Model the run targeted.
    pub model: String,
    /// Whether more than one request was issued.
    pub was_continued: bool,
    /// Requests issued, including failed ones.
    pub attempt_count: u32,
    /// Content length in bytes per attempt (0 for failed attempts).
    pub fragment_sizes: Vec<usize>,
    /// Completion reason per attempt.
    pub completion_reasons: Vec<CompletionReason>,
    /// Format the merge layer used, once known.
    pub format_used: Option<OutputFormat>,
    /// Recovery level that produced the final result.
    pub fallback_level_used: FallbackLevel,
    /// Sum of per-fragment output tokens.
    pub total_output_tokens: u32,
    /// Estimated run cost in USD.
    pub estimated_cost: f64,
    /// Whether the format-specific merge produced valid output.
    pub merge_success: bool,
    /// Diagnostic detail when the run degraded.
    pub error_detail: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the record was finalized.
    pub finished_at: DateTime<Utc>,
}

impl ContinuationMetadata {
    /// Serialize for an observability or persistence collaborator.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Append-only accumulation object owned by the controller for one run.
#[derive(Debug)]
pub struct MetadataAccumulator {
    run_id: String,
    model: String,
    started_at: DateTime<Utc>,
    fragment_sizes: Vec<usize>,
    completion_reasons: Vec<CompletionReason>,
    total_input_tokens: u32,
    total_output_tokens: u32,
    format_used: Option<OutputFormat>,
    fallback_level_used: FallbackLevel,
    merge_success: bool,
    error_detail: Option<String>,
}

impl MetadataAccumulator {
    pub fn new(run_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            model: model.into(),
            started_at: Utc::now(),
            fragment_sizes: Vec::new(),
            completion_reasons: Vec::new(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            format_used: None,
            fallback_level_used: FallbackLevel::None,
            merge_success: false,
            error_detail: None,
        }
    }

    /// Record a received fragment: size, completion reason, token usage.
    pub fn record_fragment(&mut self, fragment: &Fragment) {
        self.fragment_sizes.push(fragment.content.len());
        self.completion_reasons.push(fragment.completion_reason);
        if let Some(usage) = fragment.usage {
            self.total_input_tokens += usage.input_tokens;
            self.total_output_tokens += usage.output_tokens;
        }
    }

    /// Record an attempt that produced no fragment (transport error or
    /// timeout). Keeps the per-attempt lists aligned with the attempt count.
    pub fn record_failed_attempt(&mut self, detail: impl Into<String>) {
        self.fragment_sizes.push(0);
        self.completion_reasons.push(CompletionReason::Error);
        self.error_detail = Some(detail.into());
    }

    /// Record the format the merge layer selected.
    pub fn record_format(&mut self, format: OutputFormat) {
        self.format_used = Some(format);
    }

    /// Record the fallback level that produced the final result.
    pub fn record_fallback(&mut self, level: FallbackLevel) {
        self.fallback_level_used = level;
    }

    /// Record the merge verdict.
    pub fn record_merge(&mut self, success: bool, error_detail: Option<&str>) {
        self.merge_success = success;
        if let Some(detail) = error_detail {
            self.error_detail = Some(detail.to_string());
        }
    }

    /// Attempts recorded so far.
    pub fn attempt_count(&self) -> u32 {
        self.fragment_sizes.len() as u32
    }

    /// Finalize into the immutable record, pricing the accumulated usage.
    pub fn finalize(self, pricing: &PricingTable) -> ContinuationMetadata {
        let attempt_count = self.fragment_sizes.len() as u32;
        let estimated_cost = pricing.compute_cost(
            &self.model,
            self.total_input_tokens,
            self.total_output_tokens,
        );
        ContinuationMetadata {
            run_id: self.run_id,
            model: self.model,
            was_continued: attempt_count > 1,
            attempt_count,
            fragment_sizes: self.fragment_sizes,
            completion_reasons: self.completion_reasons,
            format_used: self.format_used,
            fallback_level_used: self.fallback_level_used,
            total_output_tokens: self.total_output_tokens,
            estimated_cost,
            merge_success: self.merge_success,
            error_detail: self.error_detail,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
