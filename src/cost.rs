//! Cost estimation from token usage
//!
//! A pure function over accumulated token counts and the configured
//! per-million-token rates. No side effects; token counts are unsigned so
//! there is no invalid-input failure mode.

use crate::config::PricingConfig;
use crate::types::TokenUsage;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Estimate the cost in USD of the given token usage at the given rates.
///
/// `cost = input/1M × input_rate + output/1M × output_rate`
///
/// # Example
///
/// ```
/// use plansmith::config::PricingConfig;
/// use plansmith::cost::estimate_cost;
/// use plansmith::types::TokenUsage;
///
/// let usage = TokenUsage::new(100_000, 50_000);
/// let cost = estimate_cost(usage, &PricingConfig::default());
/// assert!((cost - 1.05).abs() < 1e-9);
/// ```
pub fn estimate_cost(usage: TokenUsage, pricing: &PricingConfig) -> f64 {
    let input_cost = (usage.input as f64 / TOKENS_PER_UNIT) * pricing.input_per_mtok;
    let output_cost = (usage.output as f64 / TOKENS_PER_UNIT) * pricing.output_per_mtok;
    input_cost + output_cost
}
