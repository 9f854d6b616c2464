use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Price per 1000 tokens, input and output, in USD.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
	pub input_per_1k: Decimal,
	pub output_per_1k: Decimal,
}

/// Fallback rate used for models not present in the static table. Deliberately
/// conservative (priced like a mid-tier model) so an unrecognized model never
/// silently under-bills.
fn fallback_price() -> ModelPrice {
	ModelPrice {
		input_per_1k: Decimal::from_f64(0.01).unwrap(),
		output_per_1k: Decimal::from_f64(0.03).unwrap(),
	}
}

/// Static table keyed by (provider, model). Mirrors published list prices at
/// the time of writing; operators needing exact invoice reconciliation
/// should treat `cost_estimate_usd` as an estimate, per the gateway's
/// non-goals around exact upstream billing.
fn table(provider: &str, model: &str) -> Option<ModelPrice> {
	let (i, o) = match (provider, model) {
		("openai", "gpt-4o") => (0.0025, 0.01),
		("openai", "gpt-4o-mini") => (0.00015, 0.0006),
		("openai", "gpt-4-turbo") => (0.01, 0.03),
		("openai", "gpt-3.5-turbo") => (0.0005, 0.0015),
		("anthropic", "claude-3-5-sonnet-20241022") => (0.003, 0.015),
		("anthropic", "claude-3-5-haiku-20241022") => (0.0008, 0.004),
		("anthropic", "claude-3-opus-20240229") => (0.015, 0.075),
		_ => return None,
	};
	Some(ModelPrice {
		input_per_1k: Decimal::from_f64(i).unwrap(),
		output_per_1k: Decimal::from_f64(o).unwrap(),
	})
}

/// Estimate the USD cost of a completion from its token counts.
pub fn estimate_cost(provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> Decimal {
	let price = table(provider, model).unwrap_or_else(fallback_price);
	let input = Decimal::from(input_tokens) / Decimal::from(1000u32) * price.input_per_1k;
	let output = Decimal::from(output_tokens) / Decimal::from(1000u32) * price.output_per_1k;
	input + output
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_model_uses_table_price() {
		let cost = estimate_cost("openai", "gpt-4o-mini", 1000, 1000);
		assert_eq!(cost, Decimal::from_f64(0.00015).unwrap() + Decimal::from_f64(0.0006).unwrap());
	}

	#[test]
	fn unknown_model_uses_fallback() {
		let cost = estimate_cost("openai", "some-new-model", 1000, 1000);
		assert_eq!(cost, Decimal::from_f64(0.01).unwrap() + Decimal::from_f64(0.03).unwrap());
	}

	#[test]
	fn zero_tokens_cost_zero() {
		assert_eq!(estimate_cost("anthropic", "claude-3-opus-20240229", 0, 0), Decimal::ZERO);
	}
}
