//! Cost calculator for LLM calls
//!
//! Estimates the cost of a model invocation from token usage and on-demand
//! model pricing.

use std::collections::HashMap;

use crate::models::TokenUsage;

/// Pricing information for a model (per million tokens)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Cost per million input tokens
    pub input_per_million: f64,
    /// Cost per million output tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Pricing from per-million-token rates
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    fn cost(&self, usage: &TokenUsage) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let tokens_in = usage.prompt_tokens.unwrap_or(0) as f64;
        #[allow(clippy::cast_precision_loss)]
        let tokens_out = usage.completion_tokens.unwrap_or(0) as f64;

        let input_cost = (tokens_in / 1_000_000.0) * self.input_per_million;
        let output_cost = (tokens_out / 1_000_000.0) * self.output_per_million;
        input_cost + output_cost
    }
}

/// On-demand prices, keyed by model name without the vendor segment
const DEFAULT_PRICING: &[(&str, ModelPricing)] = &[
    // Anthropic
    ("claude-instant", ModelPricing::new(0.80, 2.40)),
    ("claude-v2", ModelPricing::new(8.0, 24.0)),
    ("claude-3-haiku", ModelPricing::new(0.25, 1.25)),
    ("claude-3-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-haiku", ModelPricing::new(0.80, 4.0)),
    ("claude-3-opus", ModelPricing::new(15.0, 75.0)),
    // Amazon
    ("titan-text-lite", ModelPricing::new(0.15, 0.20)),
    ("titan-text-express", ModelPricing::new(0.20, 0.60)),
    ("titan-text-premier", ModelPricing::new(0.50, 1.50)),
    ("titan-embed-text", ModelPricing::new(0.10, 0.0)),
    // Meta
    ("llama2-13b", ModelPricing::new(0.75, 1.0)),
    ("llama2-70b", ModelPricing::new(1.95, 2.56)),
    ("llama3-8b", ModelPricing::new(0.30, 0.60)),
    ("llama3-70b", ModelPricing::new(2.65, 3.50)),
    // Cohere
    ("command-text", ModelPricing::new(1.50, 2.0)),
    ("command-light-text", ModelPricing::new(0.30, 0.60)),
    ("command-r", ModelPricing::new(0.50, 1.50)),
    ("command-r-plus", ModelPricing::new(3.0, 15.0)),
    // AI21
    ("j2-mid", ModelPricing::new(12.5, 12.5)),
    ("j2-ultra", ModelPricing::new(18.8, 18.8)),
    // Mistral
    ("mistral-7b", ModelPricing::new(0.15, 0.20)),
    ("mixtral-8x7b", ModelPricing::new(0.45, 0.70)),
    ("mistral-large", ModelPricing::new(4.0, 12.0)),
];

/// Cost calculator with model pricing database
#[derive(Debug, Clone)]
pub struct CostCalculator {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostCalculator {
    /// Create a new cost calculator with default pricing
    pub fn new() -> Self {
        let pricing = DEFAULT_PRICING
            .iter()
            .map(|(model, pricing)| ((*model).to_string(), *pricing))
            .collect();
        Self { pricing }
    }

    /// Estimate the cost in USD of a call, if the model is priced and usage is known
    pub fn estimate(&self, model_name: &str, usage: &TokenUsage) -> Option<f64> {
        if usage.is_empty() {
            return None;
        }

        let Some(pricing) = self.find_pricing(model_name) else {
            tracing::debug!("Unknown model for cost calculation: {}", model_name);
            return None;
        };
        Some(pricing.cost(usage))
    }

    /// Estimate the cost in USD only when `name` itself has a price.
    ///
    /// For names the caller picks freely, such as endpoint names, where a
    /// model family appearing inside the name says nothing about the price.
    pub fn estimate_exact(&self, name: &str, usage: &TokenUsage) -> Option<f64> {
        if usage.is_empty() {
            return None;
        }
        let Some(pricing) = self.pricing.get(name) else {
            tracing::debug!("No pricing registered for {}", name);
            return None;
        };
        Some(pricing.cost(usage))
    }

    /// Find pricing for a model: exact name, then longest prefix, then longest substring.
    ///
    /// Prefix matching lets `claude-3-haiku-20240307-v1:0` resolve to `claude-3-haiku`.
    fn find_pricing(&self, model_name: &str) -> Option<&ModelPricing> {
        if let Some(pricing) = self.pricing.get(model_name) {
            return Some(pricing);
        }

        let longest = |matches: &dyn Fn(&str) -> bool| {
            self.pricing
                .iter()
                .filter(|(key, _)| matches(key))
                .max_by_key(|(key, _)| key.len())
                .map(|(_, pricing)| pricing)
        };

        longest(&|key| model_name.starts_with(key)).or_else(|| longest(&|key| model_name.contains(key)))
    }

    /// Add or update pricing for a model
    pub fn set_pricing(&mut self, model: String, pricing: ModelPricing) {
        self.pricing.insert(model, pricing);
    }

    /// Get pricing for a model
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        self.find_pricing(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_calculation_claude_haiku() {
        let calculator = CostCalculator::new();
        let cost = calculator
            .estimate("claude-3-haiku-20240307-v1:0", &TokenUsage::new(1000, 500))
            .unwrap();

        // 1000 input tokens at $0.25/M = $0.00025
        // 500 output tokens at $1.25/M = $0.000625
        assert!((cost - 0.000_875).abs() < 1e-9);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let calculator = CostCalculator::new();
        let pricing = calculator.get_pricing("command-r-plus-v1:0").unwrap();
        assert!((pricing.input_per_million - 3.0).abs() < f64::EPSILON);

        let pricing = calculator.get_pricing("command-r-v1:0").unwrap();
        assert!((pricing.input_per_million - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_model() {
        let calculator = CostCalculator::new();
        assert!(calculator
            .estimate("unknown-model-xyz", &TokenUsage::new(1000, 500))
            .is_none());
    }

    #[test]
    fn test_no_usage_no_cost() {
        let calculator = CostCalculator::new();
        assert!(calculator
            .estimate("claude-v2", &TokenUsage::default())
            .is_none());
    }

    #[test]
    fn test_custom_pricing() {
        let mut calculator = CostCalculator::new();
        calculator.set_pricing("my-endpoint".to_string(), ModelPricing::new(1.0, 2.0));
        let cost = calculator
            .estimate("my-endpoint", &TokenUsage::new(1_000_000, 1_000_000))
            .unwrap();
        assert!((cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_estimate_skips_family_matches() {
        let mut calculator = CostCalculator::new();
        let usage = TokenUsage::new(1_000_000, 0);
        assert!(calculator.estimate("prod-llama3-70b-endpoint", &usage).is_some());
        assert!(calculator.estimate_exact("prod-llama3-70b-endpoint", &usage).is_none());

        calculator.set_pricing("prod-llama3-70b-endpoint".to_string(), ModelPricing::new(2.0, 0.0));
        let cost = calculator.estimate_exact("prod-llama3-70b-endpoint", &usage).unwrap();
        assert!((cost - 2.0).abs() < 1e-9);
    }
}
