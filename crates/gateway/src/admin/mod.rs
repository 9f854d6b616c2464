//! Admin Surface (C6): CRUD on users, keys, and quotas, guarded by a single
//! operator bearer compared in constant time.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use gateway_core::{GatewayError, GatewayResult, KeyStatus, UserStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::context::Gateway;
use crate::db::models::{ApiKeySummary, User};

pub fn router() -> Router<Arc<Gateway>> {
	Router::new()
		.route("/users", post(create_user).get(list_users))
		.route(
			"/users/{user_id}",
			get(get_user_detail),
		)
		.route("/users/{user_id}/suspend", post(suspend_user))
		.route("/users/{user_id}/activate", post(activate_user))
		.route("/users/{user_id}/quota", post(update_quota))
		.route("/users/{user_id}/usage", get(read_usage))
		.route("/users/{user_id}/keys", post(create_key))
		.route("/keys/{key_id}", axum::routing::delete(revoke_key))
}

pub(crate) async fn require_operator_token(
	State(gw): State<Arc<Gateway>>,
	headers: HeaderMap,
	request: axum::extract::Request,
	next: Next,
) -> Response {
	let presented = headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "));
	let authorized = match presented {
		Some(token) => {
			let expected = gw.config.admin_token.as_bytes();
			let got = token.as_bytes();
			got.len() == expected.len() && bool::from(got.ct_eq(expected))
		},
		None => false,
	};
	if !authorized {
		return GatewayError::Forbidden.into_response();
	}
	next.run(request).await
}

#[derive(Serialize)]
struct UserBody {
	id: Uuid,
	email: Option<String>,
	name: Option<String>,
	status: UserStatus,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl From<User> for UserBody {
	fn from(u: User) -> Self {
		UserBody {
			id: u.id,
			email: u.email,
			name: u.name,
			status: u.status,
			created_at: u.created_at,
			updated_at: u.updated_at,
		}
	}
}

#[derive(Deserialize)]
struct CreateUserBody {
	email: Option<String>,
	name: Option<String>,
}

async fn create_user(
	State(gw): State<Arc<Gateway>>,
	Json(body): Json<CreateUserBody>,
) -> GatewayResult<Json<UserBody>> {
	let user = gw
		.db
		.create_user(body.email.as_deref(), body.name.as_deref())
		.await?;
	gw.db.create_default_quota(user.id, &gw.config.quota_defaults).await?;
	Ok(Json(user.into()))
}

#[derive(Deserialize)]
struct ListQuery {
	#[serde(default)]
	offset: i64,
	#[serde(default = "default_limit")]
	limit: i64,
}

fn default_limit() -> i64 {
	50
}

async fn list_users(
	State(gw): State<Arc<Gateway>>,
	Query(q): Query<ListQuery>,
) -> GatewayResult<Json<Vec<UserBody>>> {
	let users = gw.db.list_users(q.offset, q.limit).await?;
	Ok(Json(users.into_iter().map(UserBody::from).collect()))
}

#[derive(Serialize)]
struct UsageStats {
	today: StatsBody,
	this_month: StatsBody,
	all_time: StatsBody,
}

#[derive(Serialize, Default)]
struct StatsBody {
	request_count: i64,
	total_tokens: i64,
	total_cost_usd: Decimal,
}

#[derive(Serialize)]
struct UserDetailBody {
	#[serde(flatten)]
	user: UserBody,
	daily_requests_limit: i64,
	daily_tokens_limit: i64,
	monthly_spend_cap_usd: Option<Decimal>,
	max_concurrent_requests: i32,
	usage: UsageStats,
	keys: Vec<ApiKeySummary>,
}

async fn get_user_detail(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
) -> GatewayResult<Json<UserDetailBody>> {
	let user = gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	let quota = gw
		.db
		.get_quota(user_id)
		.await?
		.ok_or_else(|| GatewayError::internal("user has no quota row"))?;
	let keys = gw
		.db
		.list_keys_for_user(user_id)
		.await?
		.into_iter()
		.map(ApiKeySummary::from)
		.collect();

	use chrono::Datelike;
	let today = chrono::Local::now().date_naive();
	let today_agg = gw.db.daily_aggregate(user_id, today).await?;
	let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
	let month_agg = gw.db.aggregate_range(user_id, month_start, today).await?;
	let all_time_agg = gw.db.all_time_aggregate(user_id).await?;

	Ok(Json(UserDetailBody {
		daily_requests_limit: quota.daily_requests,
		daily_tokens_limit: quota.daily_tokens,
		monthly_spend_cap_usd: quota.monthly_spend_cap_usd,
		max_concurrent_requests: quota.max_concurrent_requests,
		usage: UsageStats {
			today: StatsBody {
				request_count: today_agg.request_count,
				total_tokens: today_agg.total_tokens,
				total_cost_usd: today_agg.total_cost_usd,
			},
			this_month: StatsBody {
				request_count: month_agg.request_count,
				total_tokens: month_agg.total_tokens,
				total_cost_usd: month_agg.total_cost_usd,
			},
			all_time: StatsBody {
				request_count: all_time_agg.request_count,
				total_tokens: all_time_agg.total_tokens,
				total_cost_usd: all_time_agg.total_cost_usd,
			},
		},
		keys,
		user: user.into(),
	}))
}

async fn suspend_user(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
) -> GatewayResult<Json<UserBody>> {
	gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	gw.db.set_user_status(user_id, UserStatus::Suspended).await?;
	gw.keystore.revoke_all_for_user(user_id).await?;
	let user = gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	Ok(Json(user.into()))
}

async fn activate_user(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
) -> GatewayResult<Json<UserBody>> {
	gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	gw.db.set_user_status(user_id, UserStatus::Active).await?;
	let user = gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	Ok(Json(user.into()))
}

#[derive(Deserialize)]
struct UpdateQuotaBody {
	#[serde(default)]
	daily_requests: Option<i64>,
	#[serde(default)]
	daily_tokens: Option<i64>,
	/// Double-option: absent key leaves the cap unchanged, `null` clears it,
	/// a number sets it.
	#[serde(default)]
	monthly_spend_cap_usd: Option<Option<Decimal>>,
	#[serde(default)]
	max_concurrent_requests: Option<i32>,
}

#[derive(Serialize)]
struct QuotaBody {
	user_id: Uuid,
	daily_requests: i64,
	daily_tokens: i64,
	monthly_spend_cap_usd: Option<Decimal>,
	max_concurrent_requests: i32,
}

async fn update_quota(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
	Json(body): Json<UpdateQuotaBody>,
) -> GatewayResult<Json<QuotaBody>> {
	let updated = gw
		.db
		.update_quota(
			user_id,
			body.daily_requests,
			body.daily_tokens,
			body.monthly_spend_cap_usd,
			body.max_concurrent_requests,
		)
		.await?
		.ok_or(GatewayError::NotFound)?;
	Ok(Json(QuotaBody {
		user_id: updated.user_id,
		daily_requests: updated.daily_requests,
		daily_tokens: updated.daily_tokens,
		monthly_spend_cap_usd: updated.monthly_spend_cap_usd,
		max_concurrent_requests: updated.max_concurrent_requests,
	}))
}

#[derive(Serialize)]
struct UsageBody {
	request_id: String,
	provider: gateway_core::Provider,
	model: String,
	input_tokens: i64,
	output_tokens: i64,
	cost_estimate_usd: Decimal,
	latency_ms: i64,
	status: gateway_core::UsageStatus,
	error_message: Option<String>,
	created_at: DateTime<Utc>,
}

async fn read_usage(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
	Query(q): Query<ListQuery>,
) -> GatewayResult<Json<Vec<UsageBody>>> {
	gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	let limit = if q.limit > 0 { q.limit } else { default_limit() };
	let records = gw.db.recent_usage(user_id, limit).await?;
	Ok(Json(
		records
			.into_iter()
			.map(|r| UsageBody {
				request_id: r.request_id,
				provider: r.provider,
				model: r.model,
				input_tokens: r.input_tokens,
				output_tokens: r.output_tokens,
				cost_estimate_usd: r.cost_estimate_usd,
				latency_ms: r.latency_ms,
				status: r.status,
				error_message: r.error_message,
				created_at: r.created_at,
			})
			.collect(),
	))
}

#[derive(Deserialize)]
struct CreateKeyBody {
	#[serde(default)]
	label: Option<String>,
}

#[derive(Serialize)]
struct CreatedKeyBody {
	key_id: Uuid,
	prefix: String,
	plaintext: String,
	banner: &'static str,
}

async fn create_key(
	State(gw): State<Arc<Gateway>>,
	Path(user_id): Path<Uuid>,
	Json(body): Json<CreateKeyBody>,
) -> GatewayResult<Json<CreatedKeyBody>> {
	gw.db.get_user(user_id).await?.ok_or(GatewayError::NotFound)?;
	let created = gw.keystore.create_key(user_id, body.label.as_deref()).await?;
	Ok(Json(CreatedKeyBody {
		key_id: created.key_id,
		prefix: created.prefix,
		plaintext: created.plaintext.expose().to_string(),
		banner: "Save this key now. It will not be shown again.",
	}))
}

#[derive(Serialize)]
struct RevokeKeyBody {
	key_id: Uuid,
	status: KeyStatus,
}

async fn revoke_key(
	State(gw): State<Arc<Gateway>>,
	Path(key_id): Path<Uuid>,
) -> GatewayResult<Json<RevokeKeyBody>> {
	let revoked = gw.keystore.revoke(key_id).await?;
	if !revoked {
		return Err(GatewayError::NotFound);
	}
	Ok(Json(RevokeKeyBody {
		key_id,
		status: KeyStatus::Revoked,
	}))
}
