use gateway_core::Provider;
use serde_json::json;

use super::types::{ChatRequest, ChatResponse};
use super::{UpstreamError, is_retryable};

pub const DEFAULT_HOST: &str = "https://api.openai.com";
pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Forward messages as-is; `response_format=json` maps to the upstream's
/// JSON-object mode.
pub async fn call(
	client: &reqwest::Client,
	api_key: &str,
	model: &str,
	req: &ChatRequest,
) -> Result<ChatResponse, UpstreamError> {
	let mut body = json!({
		"model": model,
		"messages": req.messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
	});
	if let Some(temp) = req.temperature {
		body["temperature"] = json!(temp);
	}
	if let Some(max_tokens) = req.max_tokens {
		body["max_tokens"] = json!(max_tokens);
	}
	if req.response_format_json {
		body["response_format"] = json!({"type": "json_object"});
	}

	let resp = client
		.post(format!("{DEFAULT_HOST}{CHAT_PATH}"))
		.bearer_auth(api_key)
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
	let choice = parsed
		.get("choices")
		.and_then(|c| c.get(0))
		.cloned()
		.unwrap_or(serde_json::Value::Null);
	let content = choice
		.get("message")
		.and_then(|m| m.get("content"))
		.and_then(|c| c.as_str())
		.unwrap_or("")
		.to_string();
	let finish_reason = choice
		.get("finish_reason")
		.and_then(|f| f.as_str())
		.unwrap_or("unknown")
		.to_string();
	let input_tokens = parsed
		.get("usage")
		.and_then(|u| u.get("prompt_tokens"))
		.and_then(|t| t.as_i64())
		.unwrap_or(0);
	let output_tokens = parsed
		.get("usage")
		.and_then(|u| u.get("completion_tokens"))
		.and_then(|t| t.as_i64())
		.unwrap_or(0);

	Ok(ChatResponse {
		provider: Provider::OpenAi,
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
