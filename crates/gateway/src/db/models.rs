use chrono::{DateTime, Utc};
use gateway_core::{KeyStatus, Provider, UsageStatus, UserStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
	pub id: Uuid,
	pub email: Option<String>,
	pub name: Option<String>,
	pub status: UserStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Row-level projection of an API key. Never carries the plaintext; the
/// verifier hash is present here because this type is only ever handed to
/// the key store, never serialized out over the admin surface.
#[derive(Debug, Clone)]
pub struct ApiKey {
	pub id: Uuid,
	pub user_id: Uuid,
	pub key_hash: String,
	pub prefix: String,
	pub label: Option<String>,
	pub status: KeyStatus,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

/// Public-safe projection of an API key, used by the admin surface. Never
/// includes the hash or anything that could be used to forge the plaintext.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiKeySummary {
	pub id: Uuid,
	pub prefix: String,
	pub label: Option<String>,
	pub status: KeyStatus,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeySummary {
	fn from(k: ApiKey) -> Self {
		ApiKeySummary {
			id: k.id,
			prefix: k.prefix,
			label: k.label,
			status: k.status,
			created_at: k.created_at,
			last_used_at: k.last_used_at,
		}
	}
}

#[derive(Debug, Clone)]
pub struct UserQuota {
	pub user_id: Uuid,
	pub daily_requests: i64,
	pub daily_tokens: i64,
	pub monthly_spend_cap_usd: Option<Decimal>,
	pub max_concurrent_requests: i32,
}

#[derive(Debug, Clone)]
pub struct NewUsageRecord {
	pub user_id: Uuid,
	pub request_id: String,
	pub provider: Provider,
	pub model: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cost_estimate_usd: Decimal,
	pub latency_ms: i64,
	pub status: UsageStatus,
	pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UsageRecord {
	pub id: Uuid,
	pub user_id: Uuid,
	pub request_id: String,
	pub provider: Provider,
	pub model: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cost_estimate_usd: Decimal,
	pub latency_ms: i64,
	pub status: UsageStatus,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DailyAggregate {
	pub request_count: i64,
	pub total_tokens: i64,
	pub total_cost_usd: Decimal,
}
