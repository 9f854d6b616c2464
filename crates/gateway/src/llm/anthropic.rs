use gateway_core::{GatewayError, GatewayResult, Provider};
use serde_json::json;

use super::types::{ChatRequest, ChatResponse};
use super::{UpstreamError, is_retryable};

pub const DEFAULT_HOST: &str = "https://api.anthropic.com";
pub const MESSAGES_PATH: &str = "/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Extracts the single system message, if any, from a unified request.
/// Anthropic takes system prompt as a top-level field rather than a message
/// in the conversation; more than one system message is a caller error, not
/// something the router can silently resolve.
fn extract_system(req: &ChatRequest) -> GatewayResult<(Option<String>, Vec<&super::types::Message>)> {
	let mut system = None;
	let mut rest = Vec::with_capacity(req.messages.len());
	for m in &req.messages {
		if m.role == "system" {
			if system.is_some() {
				return Err(GatewayError::ValidationError(
					"only one system message is allowed".to_string(),
				));
			}
			system = Some(m.content.clone());
		} else {
			rest.push(m);
		}
	}
	Ok((system, rest))
}

/// `max_tokens` is required by this upstream; the gateway falls back to a
/// conservative default when the caller didn't supply one. `response_format`
/// is a no-op here — the caller is responsible for prompt-level JSON
/// discipline.
pub async fn call(
	client: &reqwest::Client,
	api_key: &str,
	model: &str,
	req: &ChatRequest,
) -> Result<ChatResponse, UpstreamError> {
	let (system, rest) = extract_system(req).map_err(UpstreamError::Validation)?;

	let mut body = json!({
		"model": model,
		"max_tokens": req.max_tokens.unwrap_or(1024),
		"messages": rest.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
	});
	if let Some(system) = system {
		body["system"] = json!(system);
	}
	if let Some(temp) = req.temperature {
		body["temperature"] = json!(temp);
	}

	let resp = client
		.post(format!("{DEFAULT_HOST}{MESSAGES_PATH}"))
		.header("x-api-key", api_key)
		.header("anthropic-version", ANTHROPIC_VERSION)
		.json(&body)
		.send()
		.await
		.map_err(UpstreamError::from_transport)?;

	let status = resp.status();
	let text = resp.text().await.map_err(UpstreamError::from_transport)?;
	if !status.is_success() {
		return Err(UpstreamError::Status {
			status: status.as_u16(),
			retryable: is_retryable(status.as_u16()),
			body: truncate(&text),
		});
	}

	let parsed: serde_json::Value =
		serde_json::from_str(&text).map_err(|e| UpstreamError::Parse(e.to_string()))?;
	let content = parsed
		.get("content")
		.and_then(|c| c.get(0))
		.and_then(|b| b.get("text"))
		.and_then(|t| t.as_str())
		.unwrap_or("")
		.to_string();
	let finish_reason = parsed
		.get("stop_reason")
		.and_then(|f| f.as_str())
		.unwrap_or("unknown")
		.to_string();
	let input_tokens = parsed
		.get("usage")
		.and_then(|u| u.get("input_tokens"))
		.and_then(|t| t.as_i64())
		.unwrap_or(0);
	let output_tokens = parsed
		.get("usage")
		.and_then(|u| u.get("output_tokens"))
		.and_then(|t| t.as_i64())
		.unwrap_or(0);

	Ok(ChatResponse {
		provider: Provider::Anthropic,
		model: model.to_string(),
		content,
		input_tokens,
		output_tokens,
		finish_reason,
	})
}

fn truncate(s: &str) -> String {
	match s.char_indices().nth(500) {
		Some((idx, _)) => format!("{}...", &s[..idx]),
		None => s.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::llm::types::Message;

	fn msg(role: &str, content: &str) -> Message {
		Message {
			role: role.to_string(),
			content: content.to_string(),
		}
	}

	#[test]
	fn extracts_single_system_message() {
		let req = ChatRequest {
			messages: vec![msg("system", "be terse"), msg("user", "hi")],
			model: None,
			temperature: None,
			max_tokens: None,
			response_format_json: false,
		};
		let (system, rest) = extract_system(&req).unwrap();
		assert_eq!(system.as_deref(), Some("be terse"));
		assert_eq!(rest.len(), 1);
	}

	#[test]
	fn rejects_multiple_system_messages() {
		let req = ChatRequest {
			messages: vec![msg("system", "a"), msg("system", "b"), msg("user", "hi")],
			model: None,
			temperature: None,
			max_tokens: None,
			response_format_json: false,
		};
		assert!(extract_system(&req).is_err());
	}
}
