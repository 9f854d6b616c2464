//! Provider Router (C4): normalizes a unified request to either upstream,
//! normalizes the response, and retries transient upstream failures with
//! bounded exponential backoff.

pub mod anthropic;
pub mod openai;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use gateway_core::{Config, GatewayError, GatewayResult, Provider, ProviderTag};
use rand::Rng;

use crate::ratelimit::TokenBucket;

pub use types::{ChatRequest, ChatResponse};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(30);
const UPSTREAM_BUCKET_CAPACITY: f64 = 20.0;
const UPSTREAM_BUCKET_REFILL_PER_SEC: f64 = 20.0;

/// Outcome of a single upstream call attempt, as seen by the retry loop.
pub enum UpstreamError {
	/// Transport-level failure (connect/timeout/decode) — always retryable.
	Transport(String),
	/// The upstream responded with a non-2xx status.
	Status { status: u16, retryable: bool, body: String },
	/// The upstream's response body could not be parsed.
	Parse(String),
	/// A caller error discovered while building the upstream request (e.g.
	/// more than one system message); not retryable, not an upstream fault.
	Validation(GatewayError),
}

impl UpstreamError {
	fn from_transport(err: reqwest::Error) -> Self {
		UpstreamError::Transport(err.to_string())
	}

	fn retryable(&self) -> bool {
		match self {
			UpstreamError::Transport(_) => true,
			UpstreamError::Status { retryable, .. } => *retryable,
			UpstreamError::Parse(_) => false,
			UpstreamError::Validation(_) => false,
		}
	}
}

pub(crate) fn is_retryable(status: u16) -> bool {
	status == 429 || (500..600).contains(&status)
}

#[derive(Clone)]
pub struct ProviderRouter {
	client: reqwest::Client,
	config: Arc<Config>,
	openai_bucket: Arc<TokenBucket>,
	anthropic_bucket: Arc<TokenBucket>,
}

impl ProviderRouter {
	pub fn new(config: Arc<Config>) -> Self {
		// Header timeout is approximated with reqwest's connect timeout; the
		// overall per-call timeout bounds total body transfer time.
		let client = reqwest::Client::builder()
			.connect_timeout(Duration::from_secs(30))
			.timeout(Duration::from_secs(120))
			.build()
			.expect("reqwest client builds with static config");
		Self {
			client,
			config,
			openai_bucket: Arc::new(TokenBucket::new(
				UPSTREAM_BUCKET_CAPACITY,
				UPSTREAM_BUCKET_REFILL_PER_SEC,
			)),
			anthropic_bucket: Arc::new(TokenBucket::new(
				UPSTREAM_BUCKET_CAPACITY,
				UPSTREAM_BUCKET_REFILL_PER_SEC,
			)),
		}
	}

	/// Picks an upstream and a model for the request. If `tag` is omitted or
	/// `Auto`, the first configured upstream wins in the order
	/// {openai, anthropic}. A supplied model must be on the selected
	/// provider's allowlist.
	pub fn select(&self, tag: ProviderTag, model: Option<&str>) -> GatewayResult<(Provider, String)> {
		let provider = match tag {
			ProviderTag::OpenAi => Provider::OpenAi,
			ProviderTag::Anthropic => Provider::Anthropic,
			ProviderTag::Auto => {
				if self.config.openai_api_key.is_some() {
					Provider::OpenAi
				} else if self.config.anthropic_api_key.is_some() {
					Provider::Anthropic
				} else {
					return Err(GatewayError::NoProviderAvailable);
				}
			},
		};

		let (configured, models) = match provider {
			Provider::OpenAi => (
				self.config.openai_api_key.is_some(),
				&self.config.openai_models,
			),
			Provider::Anthropic => (
				self.config.anthropic_api_key.is_some(),
				&self.config.anthropic_models,
			),
			Provider::Unknown => (false, &self.config.openai_models),
		};
		if !configured {
			return Err(GatewayError::NoProviderAvailable);
		}

		let model = match model {
			Some(m) => {
				if !models.allowed.iter().any(|allowed| allowed == m) {
					return Err(GatewayError::ModelNotAllowed(m.to_string()));
				}
				m.to_string()
			},
			None => models.default.clone(),
		};
		Ok((provider, model))
	}

	/// Selects a provider/model, then performs the call with retries. Prefer
	/// [`Self::call_selected`] when the caller needs the selected
	/// provider/model even if the upstream call itself fails (e.g. for usage
	/// accounting on the error path).
	pub async fn dispatch(&self, tag: ProviderTag, req: ChatRequest) -> GatewayResult<ChatResponse> {
		let (provider, model) = self.select(tag, req.model.as_deref())?;
		self.call_selected(provider, &model, req).await
	}

	/// Performs the bounded-retry upstream call against an already-selected
	/// provider/model. Split out from [`Self::dispatch`] so callers can
	/// record usage against the selected provider/model even when every
	/// retry fails.
	pub async fn call_selected(
		&self,
		provider: Provider,
		model: &str,
		req: ChatRequest,
	) -> GatewayResult<ChatResponse> {
		let api_key = match provider {
			Provider::OpenAi => self.config.openai_api_key.as_deref(),
			Provider::Anthropic => self.config.anthropic_api_key.as_deref(),
			Provider::Unknown => None,
		}
		.ok_or(GatewayError::NoProviderAvailable)?;

		let bucket = match provider {
			Provider::OpenAi => &self.openai_bucket,
			Provider::Anthropic => &self.anthropic_bucket,
			Provider::Unknown => unreachable!("selection never returns Unknown"),
		};

		let mut last_err: Option<UpstreamError> = None;
		for attempt in 0..RETRY_ATTEMPTS {
			if attempt > 0 {
				let backoff = std::cmp::min(RETRY_BASE * 2u32.pow(attempt - 1), RETRY_CAP);
				let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64);
				tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
			}

			// Acquired on every attempt, not just the first, so a long backoff
			// never sits on a reserved token.
			bucket.acquire().await;

			let outcome = match provider {
				Provider::OpenAi => openai::call(&self.client, api_key, model, &req).await,
				Provider::Anthropic => anthropic::call(&self.client, api_key, model, &req).await,
				Provider::Unknown => unreachable!("selection never returns Unknown"),
			};

			match outcome {
				Ok(resp) => return Ok(resp),
				Err(UpstreamError::Validation(e)) => return Err(e),
				Err(e) => {
					let retryable = e.retryable();
					last_err = Some(e);
					if !retryable {
						break;
					}
				},
			}
		}

		Err(GatewayError::LlmError(match last_err {
			Some(UpstreamError::Transport(msg)) => msg,
			Some(UpstreamError::Status { status, body, .. }) => format!("upstream status {status}: {body}"),
			Some(UpstreamError::Parse(msg)) => msg,
			Some(UpstreamError::Validation(_)) | None => "upstream call failed".to_string(),
		}))
	}
}
