use gateway_core::Provider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
	pub role: String,
	pub content: String,
}

/// What C5 hands to the router once a request has passed body validation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
	pub messages: Vec<Message>,
	pub model: Option<String>,
	pub temperature: Option<f32>,
	pub max_tokens: Option<u32>,
	pub response_format_json: bool,
}

/// The uniform envelope every upstream call is normalized into, regardless
/// of which provider actually served it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
	pub provider: Provider,
	pub model: String,
	pub content: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub finish_reason: String,
}
