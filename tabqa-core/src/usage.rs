//! Usage Accounting
//!
//! Accumulates token counts across every provider call made by an agent
//! instance and converts them to an estimated USD cost from a fixed
//! per-model rate table (cost per 1,000,000 tokens, split input/output).
//!
//! Counters are agent-lifetime totals; conversation reset leaves them alone
//! unless the caller opted into `reset_usage_on_reset`.

use serde::{Deserialize, Serialize};

use crate::provider::TokenUsage;

// ---------------------------------------------------------------------------
// Price table
// ---------------------------------------------------------------------------

/// USD per 1,000,000 tokens for one model, split input/output.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

/// Built-in rates for the models the two adapters are typically pointed at.
/// Matched by prefix so dated model ids resolve to their family.
const PRICE_TABLE: &[(&str, ModelPrice)] = &[
    ("gpt-4o-mini", ModelPrice { input_per_mtok: 0.15, output_per_mtok: 0.60 }),
    ("gpt-4o", ModelPrice { input_per_mtok: 2.50, output_per_mtok: 10.00 }),
    ("gpt-4.1-mini", ModelPrice { input_per_mtok: 0.40, output_per_mtok: 1.60 }),
    ("gpt-4.1", ModelPrice { input_per_mtok: 2.00, output_per_mtok: 8.00 }),
    ("claude-opus-4", ModelPrice { input_per_mtok: 15.00, output_per_mtok: 75.00 }),
    ("claude-sonnet-4", ModelPrice { input_per_mtok: 3.00, output_per_mtok: 15.00 }),
    ("claude-3-5-sonnet", ModelPrice { input_per_mtok: 3.00, output_per_mtok: 15.00 }),
    ("claude-3-5-haiku", ModelPrice { input_per_mtok: 0.80, output_per_mtok: 4.00 }),
    ("claude-3-haiku", ModelPrice { input_per_mtok: 0.25, output_per_mtok: 1.25 }),
];

/// Look up the built-in rate for a model id.
///
/// Unknown models get zero rates: cost reports as 0.0 rather than failing
/// the conversation over missing pricing data.
pub fn default_price_for(model: &str) -> ModelPrice {
    PRICE_TABLE
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, price)| *price)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// A point-in-time view of accumulated usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Estimated cost in USD, rounded to 4 decimal places.
    pub estimated_cost_usd: f64,
}

/// Monotonic token accumulator with cost estimation.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    input_tokens: u64,
    output_tokens: u64,
    price: ModelPrice,
}

impl UsageTracker {
    pub fn new(price: ModelPrice) -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            price,
        }
    }

    /// Accumulate one provider response's usage. A response that reported no
    /// usage arrives here as all zeros and is a no-op.
    pub fn record(&mut self, usage: TokenUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let input_cost = self.input_tokens as f64 / 1_000_000.0 * self.price.input_per_mtok;
        let output_cost = self.output_tokens as f64 / 1_000_000.0 * self.price.output_per_mtok;
        UsageSnapshot {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
            estimated_cost_usd: round4(input_cost + output_cost),
        }
    }

    /// Zero the counters. Only the explicit reset path calls this.
    pub fn reset(&mut self) {
        self.input_tokens = 0;
        self.output_tokens = 0;
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    #[test]
    fn accumulation_is_monotonic() {
        let mut tracker = UsageTracker::new(default_price_for("gpt-4o-mini"));
        tracker.record(usage(100, 50));
        tracker.record(usage(200, 100));

        let snap = tracker.snapshot();
        assert_eq!(snap.input_tokens, 300);
        assert_eq!(snap.output_tokens, 150);
        assert_eq!(snap.total_tokens, 450);
    }

    #[test]
    fn cost_uses_rates_and_rounds_to_four_decimals() {
        let mut tracker = UsageTracker::new(ModelPrice {
            input_per_mtok: 0.15,
            output_per_mtok: 0.60,
        });
        tracker.record(usage(1_000_000, 500_000));
        assert_eq!(tracker.snapshot().estimated_cost_usd, 0.45);

        let mut small = UsageTracker::new(ModelPrice {
            input_per_mtok: 0.15,
            output_per_mtok: 0.60,
        });
        small.record(usage(300, 150));
        // 0.000045 + 0.00009 = 0.000135 → 0.0001 at 4 decimals
        assert_eq!(small.snapshot().estimated_cost_usd, 0.0001);
    }

    #[test]
    fn missing_usage_is_a_noop() {
        let mut tracker = UsageTracker::new(default_price_for("gpt-4o"));
        tracker.record(TokenUsage::default());
        let snap = tracker.snapshot();
        assert_eq!(snap.total_tokens, 0);
        assert_eq!(snap.estimated_cost_usd, 0.0);
    }

    #[test]
    fn unknown_model_has_zero_rates() {
        let price = default_price_for("some-local-model");
        assert_eq!(price.input_per_mtok, 0.0);
        assert_eq!(price.output_per_mtok, 0.0);
    }

    #[test]
    fn prefix_matching_resolves_dated_ids() {
        let price = default_price_for("claude-sonnet-4-20250514");
        assert_eq!(price.input_per_mtok, 3.00);

        let price = default_price_for("gpt-4o-mini-2024-07-18");
        assert_eq!(price.input_per_mtok, 0.15);
    }

    #[test]
    fn reset_zeroes_counters() {
        let mut tracker = UsageTracker::new(default_price_for("gpt-4o"));
        tracker.record(usage(10, 20));
        tracker.reset();
        assert_eq!(tracker.snapshot().total_tokens, 0);
    }
}
