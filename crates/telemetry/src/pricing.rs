//! Pricing for cost estimation.
//!
//! Prices are USD per 1 million tokens, with separate input and output
//! rates. The engine only multiplies rates by usage; keeping the table
//! current is the caller's concern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// A flat per-token rate applied to input and output alike.
    pub fn flat(per_token: f64) -> Self {
        let per_m = per_token * 1_000_000.0;
        Self::new(per_m, per_m)
    }

    /// Cost in USD for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Model-name → pricing lookup with built-in defaults.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// A table with prices for the models continuation runs commonly target.
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.set("anthropic/claude-sonnet-4", ModelPricing::new(3.0, 15.0));
        table.set("anthropic/claude-opus-4", ModelPricing::new(15.0, 75.0));
        table.set("anthropic/claude-3.5-haiku", ModelPricing::new(0.8, 4.0));
        table.set("openai/gpt-4o", ModelPricing::new(2.5, 10.0));
        table.set("openai/gpt-4o-mini", ModelPricing::new(0.15, 0.6));
        table.set("google/gemini-2.0-flash", ModelPricing::new(0.1, 0.4));
        table.set("deepseek/deepseek-v3", ModelPricing::new(0.27, 1.1));
        table
    }

    /// An empty table; every lookup misses and costs out at 0.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or override pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Number of models in the table.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Find pricing for a model name.
    ///
    /// Tries an exact match, then the bare name with known provider prefixes
    /// (`gpt-4o` → `openai/gpt-4o`), then the longest table entry whose bare
    /// name is a prefix of the queried model, so versioned response names
    /// like `gpt-4o-mini-2024-07-18` still resolve.
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        let lower = model.to_lowercase();
        let bare = lower.rsplit('/').next().unwrap_or(&lower);

        let mut best: Option<(usize, ModelPricing)> = None;
        for (key, pricing) in &self.prices {
            let bare_key = key.rsplit('/').next().unwrap_or(key);
            if bare.starts_with(&bare_key.to_lowercase())
                && best.is_none_or(|(len, _)| bare_key.len() > len)
            {
                best = Some((bare_key.len(), *pricing));
            }
        }
        best.map(|(_, p)| p)
    }

    /// Cost for a run against this table; 0.0 when the model is unknown.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.resolve(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
