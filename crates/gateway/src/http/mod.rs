//! Request Pipeline (C5): wires an incoming end-user request through
//! authenticate → authorize → dispatch → record → release, plus the
//! unauthenticated health endpoints.

pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_core::{GatewayError, GatewayResult, Provider, UsageStatus, UserStatus};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::Gateway;
use validation::{CompleteRequestBody, validate_complete};

pub fn router() -> Router<Arc<Gateway>> {
	Router::new()
		.route("/health", get(health))
		.route("/health/ready", get(health_ready))
		.route("/v1/llm/complete", post(complete))
		.route("/v1/llm/models", get(models))
		.route("/v1/llm/quota", get(quota))
}

#[derive(Serialize)]
struct HealthBody {
	status: &'static str,
	timestamp: chrono::DateTime<chrono::Utc>,
}

async fn health() -> Json<HealthBody> {
	Json(HealthBody {
		status: "ok",
		timestamp: chrono::Utc::now(),
	})
}

#[derive(Serialize)]
struct ReadyBody {
	status: &'static str,
	checks: ReadyChecks,
}

#[derive(Serialize)]
struct ReadyChecks {
	persistence: bool,
	upstream_configured: bool,
}

async fn health_ready(State(gw): State<Arc<Gateway>>) -> Response {
	let persistence = gw.db.health_check().await;
	let upstream_configured =
		gw.config.openai_api_key.is_some() || gw.config.anthropic_api_key.is_some();
	let body = ReadyBody {
		status: if persistence && upstream_configured {
			"ready"
		} else {
			"degraded"
		},
		checks: ReadyChecks {
			persistence,
			upstream_configured,
		},
	};
	let status = if persistence && upstream_configured {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(status, Json(body)).into_response()
}

/// Extracts the raw bearer token, if any, without validating it. Used both
/// for authentication and, pre-authentication, to derive the rate-limit
/// identity from the token's prefix.
fn raw_bearer(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	value.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

fn rate_limit_identity(headers: &HeaderMap, addr: SocketAddr) -> String {
	match raw_bearer(headers) {
		Some(token) => token.chars().take(crate::keystore::LOOKUP_PREFIX_LEN).collect(),
		None => format!("ip:{}", addr.ip()),
	}
}

#[derive(Serialize)]
struct Usage {
	input_tokens: i64,
	output_tokens: i64,
	total_tokens: i64,
}

#[derive(Serialize)]
struct CompleteResponseBody {
	id: String,
	provider: Provider,
	model: String,
	content: String,
	usage: Usage,
	finish_reason: String,
}

async fn complete(
	State(gw): State<Arc<Gateway>>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let request_id = Uuid::new_v4().to_string();
	let span = tracing::info_span!("llm_complete", request_id = %request_id);
	run_complete(gw, addr, headers, body, request_id.clone())
		.instrument(span)
		.await
		.unwrap_or_else(|e| e.into_response())
		.into_response()
}

/// The body is taken as raw bytes at the extractor level rather than via
/// `Json<CompleteRequestBody>`: axum runs parameter extractors before the
/// handler body and short-circuits on the first failure, which would let a
/// malformed body skip the rate limiter and authentication below and return
/// axum's bare `JsonRejection` instead of the gateway's error envelope.
/// Deserialization happens here instead, after both checks.
async fn run_complete(
	gw: Arc<Gateway>,
	addr: SocketAddr,
	headers: HeaderMap,
	body: Bytes,
	request_id: String,
) -> GatewayResult<Response> {
	let identity = rate_limit_identity(&headers, addr);
	if !gw.admission_limiter.check(&identity).await {
		return Err(GatewayError::RateLimitExceeded);
	}

	let token = raw_bearer(&headers).ok_or(GatewayError::Unauthorized)?;
	let (user_id, _key_id) = gw.keystore.verify(token).await?;

	let user = gw.db.get_user(user_id).await?.ok_or(GatewayError::Forbidden)?;
	if user.status != UserStatus::Active {
		return Err(GatewayError::Forbidden);
	}

	let body: CompleteRequestBody = serde_json::from_slice(&body)
		.map_err(|e| GatewayError::ValidationError(format!("invalid request body: {e}")))?;

	if gw.config.log_prompts {
		tracing::debug!(
			request_id = %request_id,
			messages = ?body.messages,
			"logging prompt contents (LOG_PROMPTS=true)"
		);
	}

	let (tag, chat_req) = validate_complete(body)?;

	let guard = gw.quota.admit(user_id).await?;

	let start = Instant::now();
	let selection = gw.router.select(tag, chat_req.model.as_deref());
	let (provider, model) = match selection {
		Ok(pm) => pm,
		Err(e) => {
			// Pre-dispatch failure: accounted against the unknown sentinel
			// per the retained design decision documented in DESIGN.md.
			let latency_ms = start.elapsed().as_millis() as i64;
			let _ = gw
				.quota
				.record(
					&guard,
					user_id,
					&request_id,
					Provider::Unknown,
					"unknown",
					0,
					0,
					latency_ms,
					UsageStatus::Error,
					Some(e.to_string()),
				)
				.await;
			return Err(e);
		},
	};

	match gw.router.call_selected(provider, &model, chat_req).await {
		Ok(resp) => {
			let latency_ms = start.elapsed().as_millis() as i64;
			if let Err(e) = gw
				.quota
				.record(
					&guard,
					user_id,
					&request_id,
					resp.provider,
					&resp.model,
					resp.input_tokens,
					resp.output_tokens,
					latency_ms,
					UsageStatus::Success,
					None,
				)
				.await
			{
				tracing::error!(error = %e, request_id = %request_id, "failed to record usage for successful completion");
			}
			Ok(
				Json(CompleteResponseBody {
					id: request_id,
					provider: resp.provider,
					model: resp.model,
					content: resp.content,
					usage: Usage {
						input_tokens: resp.input_tokens,
						output_tokens: resp.output_tokens,
						total_tokens: resp.input_tokens + resp.output_tokens,
					},
					finish_reason: resp.finish_reason,
				})
				.into_response(),
			)
		},
		Err(e) => {
			let latency_ms = start.elapsed().as_millis() as i64;
			let _ = gw
				.quota
				.record(
					&guard,
					user_id,
					&request_id,
					provider,
					&model,
					0,
					0,
					latency_ms,
					UsageStatus::Error,
					Some(e.to_string()),
				)
				.await;
			Err(e)
		},
	}
}

#[derive(Serialize)]
struct ModelsBody {
	providers: Vec<ProviderModelsBody>,
}

#[derive(Serialize)]
struct ProviderModelsBody {
	provider: Provider,
	default_model: String,
	models: Vec<String>,
}

async fn models(State(gw): State<Arc<Gateway>>, headers: HeaderMap) -> GatewayResult<Json<ModelsBody>> {
	let token = raw_bearer(&headers).ok_or(GatewayError::Unauthorized)?;
	gw.keystore.verify(token).await?;
	let mut providers = Vec::new();
	if gw.config.openai_api_key.is_some() {
		providers.push(ProviderModelsBody {
			provider: Provider::OpenAi,
			default_model: gw.config.openai_models.default.clone(),
			models: gw.config.openai_models.allowed.clone(),
		});
	}
	if gw.config.anthropic_api_key.is_some() {
		providers.push(ProviderModelsBody {
			provider: Provider::Anthropic,
			default_model: gw.config.anthropic_models.default.clone(),
			models: gw.config.anthropic_models.allowed.clone(),
		});
	}
	Ok(Json(ModelsBody { providers }))
}

#[derive(Serialize)]
struct QuotaDimensionBody {
	limit: i64,
	used: i64,
	remaining: i64,
}

#[derive(Serialize)]
struct MonthlySpendBody {
	cap_usd: Option<rust_decimal::Decimal>,
	used_usd: rust_decimal::Decimal,
	remaining_usd: Option<rust_decimal::Decimal>,
}

#[derive(Serialize)]
struct QuotaBody {
	user_id: Uuid,
	daily_requests: QuotaDimensionBody,
	daily_tokens: QuotaDimensionBody,
	monthly_spend: MonthlySpendBody,
}

async fn quota(State(gw): State<Arc<Gateway>>, headers: HeaderMap) -> GatewayResult<Json<QuotaBody>> {
	let token = raw_bearer(&headers).ok_or(GatewayError::Unauthorized)?;
	let (user_id, _key_id) = gw.keystore.verify(token).await?;
	let user = gw.db.get_user(user_id).await?.ok_or(GatewayError::Forbidden)?;
	if user.status != UserStatus::Active {
		return Err(GatewayError::Forbidden);
	}

	let inspection = gw.quota.inspect(user_id).await?;
	Ok(Json(QuotaBody {
		user_id,
		daily_requests: QuotaDimensionBody {
			limit: inspection.daily_requests_limit,
			used: inspection.daily_requests_used,
			remaining: (inspection.daily_requests_limit - inspection.daily_requests_used).max(0),
		},
		daily_tokens: QuotaDimensionBody {
			limit: inspection.daily_tokens_limit,
			used: inspection.daily_tokens_used,
			remaining: (inspection.daily_tokens_limit - inspection.daily_tokens_used).max(0),
		},
		monthly_spend: MonthlySpendBody {
			cap_usd: inspection.monthly_spend_cap_usd,
			used_usd: inspection.monthly_spend_used_usd,
			remaining_usd: inspection
				.monthly_spend_cap_usd
				.map(|cap| (cap - inspection.monthly_spend_used_usd).max(rust_decimal::Decimal::ZERO)),
		},
	}))
}
