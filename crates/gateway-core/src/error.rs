use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The quota dimension a `quota_exceeded` refusal was raised on.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDimension {
	DailyRequests,
	DailyTokens,
	MonthlySpend,
}

impl QuotaDimension {
	pub fn as_str(&self) -> &'static str {
		match self {
			QuotaDimension::DailyRequests => "daily_requests",
			QuotaDimension::DailyTokens => "daily_tokens",
			QuotaDimension::MonthlySpend => "monthly_spend",
		}
	}
}

impl std::fmt::Display for QuotaDimension {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The single error type that crosses the pipeline boundary. Every variant
/// maps 1:1 to the taxonomy in the gateway's error-handling design: one HTTP
/// status, one `error` string, and whatever extra fields that kind carries.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("unauthorized")]
	Unauthorized,
	#[error("forbidden")]
	Forbidden,
	#[error("validation error: {0}")]
	ValidationError(String),
	#[error("quota exceeded: {dimension}")]
	QuotaExceeded {
		dimension: QuotaDimension,
		limit: i64,
		used: i64,
		resets_at: DateTime<Utc>,
	},
	#[error("too many concurrent requests")]
	TooManyConcurrent { limit: i32 },
	#[error("rate limit exceeded")]
	RateLimitExceeded,
	#[error("no provider available")]
	NoProviderAvailable,
	#[error("model not allowed: {0}")]
	ModelNotAllowed(String),
	#[error("upstream llm call failed: {0}")]
	LlmError(String),
	#[error("internal error: {0}")]
	Internal(String),
	#[error("not found")]
	NotFound,
}

impl GatewayError {
	pub fn internal(err: impl std::fmt::Display) -> Self {
		// Never surface the raw cause to the client; it's logged by the caller instead.
		tracing::error!(error = %err, "internal error");
		GatewayError::Internal(err.to_string())
	}

	fn status(&self) -> StatusCode {
		match self {
			GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
			GatewayError::Forbidden => StatusCode::FORBIDDEN,
			GatewayError::ValidationError(_) => StatusCode::BAD_REQUEST,
			GatewayError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
			GatewayError::TooManyConcurrent { .. } => StatusCode::TOO_MANY_REQUESTS,
			GatewayError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
			GatewayError::NoProviderAvailable => StatusCode::SERVICE_UNAVAILABLE,
			GatewayError::ModelNotAllowed(_) => StatusCode::BAD_REQUEST,
			GatewayError::LlmError(_) => StatusCode::BAD_GATEWAY,
			GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
			GatewayError::NotFound => StatusCode::NOT_FOUND,
		}
	}

	fn kind(&self) -> &'static str {
		match self {
			GatewayError::Unauthorized => "unauthorized",
			GatewayError::Forbidden => "forbidden",
			GatewayError::ValidationError(_) => "validation_error",
			GatewayError::QuotaExceeded { .. } => "quota_exceeded",
			GatewayError::TooManyConcurrent { .. } => "too_many_concurrent",
			GatewayError::RateLimitExceeded => "rate_limit_exceeded",
			GatewayError::NoProviderAvailable => "no_provider_available",
			GatewayError::ModelNotAllowed(_) => "model_not_allowed",
			GatewayError::LlmError(_) => "llm_error",
			GatewayError::Internal(_) => "internal_error",
			GatewayError::NotFound => "not_found",
		}
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	dimension: Option<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	limit: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	used: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	resets_at: Option<DateTime<Utc>>,
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response {
		let status = self.status();
		let kind = self.kind();
		let message = self.to_string();
		let body = match &self {
			GatewayError::QuotaExceeded {
				dimension,
				limit,
				used,
				resets_at,
			} => ErrorBody {
				error: kind,
				message,
				dimension: Some(dimension.as_str()),
				limit: Some(*limit),
				used: Some(*used),
				resets_at: Some(*resets_at),
			},
			GatewayError::TooManyConcurrent { limit } => ErrorBody {
				error: kind,
				message,
				dimension: None,
				limit: Some(*limit as i64),
				used: None,
				resets_at: None,
			},
			_ => ErrorBody {
				error: kind,
				message,
				dimension: None,
				limit: None,
				used: None,
				resets_at: None,
			},
		};
		(status, Json(body)).into_response()
	}
}

pub type GatewayResult<T> = Result<T, GatewayError>;
