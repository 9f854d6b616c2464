use gateway_core::{GatewayError, GatewayResult, ProviderTag};
use serde::Deserialize;

use crate::llm::ChatRequest;
use crate::llm::types::Message;

#[derive(Debug, Deserialize)]
pub struct CompleteRequestBody {
	#[serde(default)]
	pub provider: Option<String>,
	#[serde(default)]
	pub model: Option<String>,
	pub messages: Vec<MessageBody>,
	#[serde(default)]
	pub temperature: Option<f32>,
	#[serde(default)]
	pub max_tokens: Option<u32>,
	#[serde(default)]
	pub response_format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
	pub role: String,
	pub content: String,
}

const MAX_MESSAGES: usize = 100;
const MAX_CONTENT_CHARS: usize = 100_000;
const MIN_TEMPERATURE: f32 = 0.0;
const MAX_TEMPERATURE: f32 = 2.0;
const MIN_MAX_TOKENS: u32 = 1;
const MAX_MAX_TOKENS: u32 = 16_000;

/// Validates an inbound completion request against the unified schema and
/// splits it into the provider tag (defaulting to auto) and the request the
/// router understands.
pub fn validate_complete(body: CompleteRequestBody) -> GatewayResult<(ProviderTag, ChatRequest)> {
	if body.messages.is_empty() || body.messages.len() > MAX_MESSAGES {
		return Err(GatewayError::ValidationError(format!(
			"messages must contain between 1 and {MAX_MESSAGES} entries"
		)));
	}
	let mut messages = Vec::with_capacity(body.messages.len());
	for m in body.messages {
		if !matches!(m.role.as_str(), "system" | "user" | "assistant") {
			return Err(GatewayError::ValidationError(format!(
				"message role must be one of system, user, assistant; got {}",
				m.role
			)));
		}
		if m.content.chars().count() > MAX_CONTENT_CHARS {
			return Err(GatewayError::ValidationError(format!(
				"message content must not exceed {MAX_CONTENT_CHARS} characters"
			)));
		}
		messages.push(Message {
			role: m.role,
			content: m.content,
		});
	}

	if let Some(t) = body.temperature {
		if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) {
			return Err(GatewayError::ValidationError(format!(
				"temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
			)));
		}
	}
	if let Some(mt) = body.max_tokens {
		if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&mt) {
			return Err(GatewayError::ValidationError(format!(
				"max_tokens must be between {MIN_MAX_TOKENS} and {MAX_MAX_TOKENS}"
			)));
		}
	}
	let response_format_json = match body.response_format.as_deref() {
		None | Some("text") => false,
		Some("json") => true,
		Some(other) => {
			return Err(GatewayError::ValidationError(format!(
				"response_format must be text or json; got {other}"
			)));
		},
	};

	let tag = match body.provider.as_deref() {
		None | Some("auto") => ProviderTag::Auto,
		Some("openai") => ProviderTag::OpenAi,
		Some("anthropic") => ProviderTag::Anthropic,
		Some(other) => {
			return Err(GatewayError::ValidationError(format!(
				"provider must be one of auto, openai, anthropic; got {other}"
			)));
		},
	};

	Ok((
		tag,
		ChatRequest {
			messages,
			model: body.model,
			temperature: body.temperature,
			max_tokens: body.max_tokens,
			response_format_json,
		},
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_body(messages: Vec<MessageBody>) -> CompleteRequestBody {
		CompleteRequestBody {
			provider: None,
			model: None,
			messages,
			temperature: None,
			max_tokens: None,
			response_format: None,
		}
	}

	fn msg(role: &str, content: &str) -> MessageBody {
		MessageBody {
			role: role.to_string(),
			content: content.to_string(),
		}
	}

	#[test]
	fn empty_messages_is_rejected() {
		assert!(validate_complete(base_body(vec![])).is_err());
	}

	#[test]
	fn too_many_messages_is_rejected() {
		let messages = (0..101).map(|_| msg("user", "hi")).collect();
		assert!(validate_complete(base_body(messages)).is_err());
	}

	#[test]
	fn oversized_content_is_rejected() {
		let content = "a".repeat(100_001);
		assert!(validate_complete(base_body(vec![msg("user", &content)])).is_err());
	}

	#[test]
	fn temperature_bounds_are_enforced() {
		let mut body = base_body(vec![msg("user", "hi")]);
		body.temperature = Some(-0.01);
		assert!(validate_complete(body).is_err());

		let mut body = base_body(vec![msg("user", "hi")]);
		body.temperature = Some(2.01);
		assert!(validate_complete(body).is_err());
	}

	#[test]
	fn max_tokens_bounds_are_enforced() {
		let mut body = base_body(vec![msg("user", "hi")]);
		body.max_tokens = Some(0);
		assert!(validate_complete(body).is_err());

		let mut body = base_body(vec![msg("user", "hi")]);
		body.max_tokens = Some(16_001);
		assert!(validate_complete(body).is_err());
	}

	#[test]
	fn valid_body_passes() {
		let body = base_body(vec![msg("user", "hi")]);
		assert!(validate_complete(body).is_ok());
	}
}
