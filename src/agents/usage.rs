use serde::Serialize;

use crate::config::PricingConfig;
use crate::providers::ResponseUsage;

/// Token usage summed over every response in a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub requests: u32,
    pub input_tokens: u64,
    pub cached_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
}

impl UsageTotals {
    pub fn add(&mut self, usage: Option<&ResponseUsage>) {
        self.requests += 1;
        let Some(usage) = usage else {
            return;
        };
        self.input_tokens += usage.input_tokens;
        self.cached_tokens += usage.cached_tokens();
        self.output_tokens += usage.output_tokens;
        self.reasoning_tokens += usage.reasoning_tokens();
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Estimated cost in USD. Cached input tokens are billed at the cached rate.
    pub fn estimated_cost(&self, pricing: &PricingConfig) -> f64 {
        let cached = self.cached_tokens.min(self.input_tokens);
        let uncached = self.input_tokens - cached;
        (uncached as f64 * pricing.input
            + cached as f64 * pricing.cached_input
            + self.output_tokens as f64 * pricing.output)
            / 1_000_000.0
    }
}

/// Estimated cost in USD of embedding roughly `chars` characters.
pub fn embedding_cost(chars: usize, pricing: &PricingConfig) -> f64 {
    (chars as f64 / 4.0) * pricing.embedding / 1_000_000.0
}
