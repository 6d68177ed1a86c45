//! The continuation controller.
//!
//! Owns one `ContinuationRun` for its lifetime: dispatches requests,
//! accumulates fragments, decides termination, then invokes the fallback
//! chain over the immutable fragment sequence. The retry loop is strictly
//! sequential; each continuation request depends on the completion reason of
//! the previous response. Transport errors and timeouts are not retried
//! here — retry policy for transient failures belongs to the transport —
//! they terminate the loop and merging proceeds over whatever was collected.

use restitch_config::{ContinuationConfig, FailurePolicy};
use restitch_core::error::{Error, MergeError, Result};
use restitch_core::fragment::ContinuationRun;
use restitch_core::result::MergeResult;
use restitch_core::transport::{ContinuationCue, Transport, TransportRequest};
use restitch_merge::{FallbackChain, MergerFactory};
use restitch_telemetry::{ContinuationMetadata, MetadataAccumulator, PricingTable};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Loop state, advanced strictly forward within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    AwaitingResponse,
    Accumulating,
    Merging,
    Done,
    Failed,
}

/// What a finished run hands back: the merged artifact plus the run record.
#[derive(Debug)]
pub struct ContinuationOutcome {
    pub result: MergeResult,
    pub metadata: ContinuationMetadata,
}

/// Drives the bounded request loop for one logical request at a time.
///
/// The controller itself is per-run state-free: `run` owns all loop state on
/// its stack, so a controller may be reused for sequential runs, while the
/// factory and pricing table it shares are stateless and reentrant.
pub struct ContinuationController {
    transport: Arc<dyn Transport>,
    config: ContinuationConfig,
    factory: Arc<MergerFactory>,
    pricing: Arc<PricingTable>,
    cancellation: CancellationToken,
}

impl ContinuationController {
    /// Create a controller over a transport with a validated configuration.
    pub fn new(transport: Arc<dyn Transport>, config: ContinuationConfig) -> Self {
        Self {
            transport,
            config,
            factory: Arc::new(MergerFactory::new()),
            pricing: Arc::new(PricingTable::with_defaults()),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use a custom pricing table for cost estimation.
    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Attach a caller-supplied cancellation token. Cancellation between
    /// attempts (or mid-attempt) stops requesting and proceeds directly to
    /// merging whatever was accumulated; partial work is never discarded.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Execute one continuation run to completion.
    pub async fn run(&self, request: TransportRequest) -> Result<ContinuationOutcome> {
        let mut state = RunState::Idle;
        let mut run = ContinuationRun::new();
        let run_id = run.id.to_string();
        let mut accumulator = MetadataAccumulator::new(&run_id, request.model.clone());
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        info!(
            run_id = %run_id,
            model = %request.model,
            max_attempts = self.config.max_attempts,
            state = ?state,
            "starting continuation run"
        );

        loop {
            let attempt = accumulator.attempt_count() + 1;
            let outbound = if run.is_empty() {
                request.clone()
            } else {
                request.continued(self.continuation_cue(&run))
            };

            state = RunState::AwaitingResponse;
            debug!(run_id = %run_id, attempt, state = ?state, "dispatching request");

            // Cancellation wins over a simultaneously-ready response so a
            // cancelled caller observes a prompt stop.
            let received = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    info!(run_id = %run_id, attempt, "cancelled mid-attempt, merging partial work");
                    break;
                }
                sent = tokio::time::timeout(timeout, self.transport.send(outbound)) => sent,
            };

            match received {
                Ok(Ok(fragment)) => {
                    state = RunState::Accumulating;
                    debug!(
                        run_id = %run_id,
                        attempt,
                        state = ?state,
                        reason = %fragment.completion_reason,
                        bytes = fragment.content.len(),
                        "fragment received"
                    );
                    accumulator.record_fragment(&fragment);
                    run.push(fragment);
                }
                Ok(Err(e)) => {
                    warn!(run_id = %run_id, attempt, error = %e, "transport failed, merging collected fragments");
                    accumulator.record_failed_attempt(e.to_string());
                    break;
                }
                Err(_) => {
                    warn!(
                        run_id = %run_id,
                        attempt,
                        timeout_secs = timeout.as_secs(),
                        "transport timed out, merging collected fragments"
                    );
                    accumulator
                        .record_failed_attempt(format!("transport timed out after {}s", timeout.as_secs()));
                    break;
                }
            }

            // run.last() is the fragment just pushed.
            if run.last().is_some_and(|f| f.completion_reason.is_terminal()) {
                break;
            }
            if accumulator.attempt_count() >= self.config.max_attempts {
                // Exhausted attempts while still truncated: degraded but
                // non-fatal, reported through metadata.
                warn!(
                    run_id = %run_id,
                    attempts = accumulator.attempt_count(),
                    "attempts exhausted while still truncated"
                );
                break;
            }
            if self.cancellation.is_cancelled() {
                info!(run_id = %run_id, "cancelled between attempts, merging partial work");
                break;
            }
        }

        state = RunState::Merging;
        debug!(run_id = %run_id, state = ?state, fragments = run.len(), "merging accumulated fragments");

        let fragments = run.into_fragments();
        if fragments.is_empty() {
            state = RunState::Failed;
            warn!(run_id = %run_id, state = ?state, "no fragments collected, nothing to merge");
            return Err(MergeError::NoFragments.into());
        }

        let chain = FallbackChain::new(Arc::clone(&self.factory));
        let merged = chain.merge(self.config.output_format, &fragments)?;

        accumulator.record_format(merged.format);
        accumulator.record_fallback(merged.level);
        accumulator.record_merge(merged.result.success, merged.result.error.as_deref());
        let metadata = accumulator.finalize(&self.pricing);

        state = if merged.result.success {
            RunState::Done
        } else {
            RunState::Failed
        };
        info!(
            run_id = %run_id,
            state = ?state,
            attempts = metadata.attempt_count,
            fallback = %metadata.fallback_level_used,
            output_tokens = metadata.total_output_tokens,
            cost_usd = metadata.estimated_cost,
            "continuation run finished"
        );

        if !merged.result.success && self.config.on_failure == FailurePolicy::RaiseError {
            warn!(run_id = %run_id, metadata = %metadata.to_json(), "degraded merge raised per failure policy");
            return Err(Error::Merge(MergeError::Degraded {
                fallback_level: metadata.fallback_level_used.to_string(),
                detail: metadata
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "merge produced degraded output".into()),
            }));
        }

        Ok(ContinuationOutcome {
            result: merged.result,
            metadata,
        })
    }

    /// Build the continuation context for the next attempt: the merger's
    /// format-aware hint for the accumulated tail, plus a reference to the
    /// prior exchange where the transport supports it.
    fn continuation_cue(&self, run: &ContinuationRun) -> ContinuationCue {
        let first = run
            .fragments()
            .first()
            .map(|f| f.content.as_str())
            .unwrap_or("");
        let (merger, _, _) = self.factory.resolve(self.config.output_format, first);
        ContinuationCue {
            hint: merger.continuation_hint(&run.accumulated_text()),
            previous_exchange_id: run.last().and_then(|f| f.exchange_id.clone()),
        }
    }
}
