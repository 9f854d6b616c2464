//! Persistence (C1). Two backends — an embedded SQLite file for development
//! and a server backend (Postgres) for production — share this one query
//! surface via `sqlx::Any`, which rewrites the `?` placeholders used
//! throughout this module into whatever the connected driver expects. See
//! DESIGN.md for why monetary/id/timestamp columns are TEXT rather than
//! native types: `Any` only binds primitives portably across drivers.

pub mod migrations;
pub mod models;

use std::str::FromStr;
use std::sync::Once;

use chrono::{DateTime, NaiveDate, Utc};
use gateway_core::{GatewayError, GatewayResult, KeyStatus, Provider, UsageStatus, UserStatus};
use rust_decimal::Decimal;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use gateway_core::PersistenceTarget;
use models::{ApiKey, DailyAggregate, NewUsageRecord, User, UserQuota, UsageRecord};

static INSTALL_DRIVERS: Once = Once::new();

#[derive(Clone)]
pub struct Db {
	pool: AnyPool,
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339()
}

fn parse_ts(s: &str) -> GatewayResult<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.map(|d| d.with_timezone(&Utc))
		.map_err(GatewayError::internal)
}

fn parse_decimal(s: &str) -> GatewayResult<Decimal> {
	Decimal::from_str(s).map_err(GatewayError::internal)
}

impl Db {
	pub async fn connect(target: &PersistenceTarget) -> anyhow::Result<Self> {
		INSTALL_DRIVERS.call_once(|| {
			sqlx::any::install_default_drivers();
		});
		let url = match target {
			PersistenceTarget::Sqlite(path) => format!("sqlite://{path}?mode=rwc"),
			PersistenceTarget::Server(url) => url.clone(),
		};
		let pool = AnyPoolOptions::new()
			.max_connections(10)
			.connect(&url)
			.await?;
		let db = Db { pool };
		db.migrate().await?;
		Ok(db)
	}

	/// Run any migrations this binary knows about that haven't been applied
	/// yet. Refuses to start if the stored version is newer than
	/// [`migrations::CURRENT_SCHEMA_VERSION`] — that means an older binary is
	/// talking to a schema it doesn't understand.
	async fn migrate(&self) -> anyhow::Result<()> {
		sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
			.execute(&self.pool)
			.await?;
		let current: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
			.fetch_optional(&self.pool)
			.await
			.unwrap_or(None);
		let current = current.unwrap_or(0);
		if current > migrations::CURRENT_SCHEMA_VERSION {
			anyhow::bail!(
				"database schema version {current} is newer than this binary understands ({})",
				migrations::CURRENT_SCHEMA_VERSION
			);
		}
		for version in (current + 1)..=migrations::CURRENT_SCHEMA_VERSION {
			let statements = migrations::MIGRATIONS[(version - 1) as usize];
			let mut tx = self.pool.begin().await?;
			for stmt in statements {
				sqlx::query(stmt).execute(&mut *tx).await?;
			}
			if current == 0 && version == 1 {
				sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
					.bind(version)
					.execute(&mut *tx)
					.await?;
			} else {
				sqlx::query("UPDATE schema_version SET version = ?")
					.bind(version)
					.execute(&mut *tx)
					.await?;
			}
			tx.commit().await?;
		}
		Ok(())
	}

	pub async fn health_check(&self) -> bool {
		sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
	}

	// ---- users ----------------------------------------------------------

	pub async fn create_user(
		&self,
		email: Option<&str>,
		name: Option<&str>,
	) -> GatewayResult<User> {
		let id = Uuid::new_v4();
		let now = Utc::now();
		sqlx::query(
			"INSERT INTO users (id, email, name, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(id.to_string())
		.bind(email)
		.bind(name)
		.bind(UserStatus::Active.as_str())
		.bind(fmt_ts(now))
		.bind(fmt_ts(now))
		.execute(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		Ok(User {
			id,
			email: email.map(str::to_string),
			name: name.map(str::to_string),
			status: UserStatus::Active,
			created_at: now,
			updated_at: now,
		})
	}

	pub async fn get_user(&self, user_id: Uuid) -> GatewayResult<Option<User>> {
		let row = sqlx::query("SELECT id, email, name, status, created_at, updated_at FROM users WHERE id = ?")
			.bind(user_id.to_string())
			.fetch_optional(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		row.map(row_to_user).transpose()
	}

	pub async fn list_users(&self, offset: i64, limit: i64) -> GatewayResult<Vec<User>> {
		let limit = limit.clamp(1, 200);
		let offset = offset.max(0);
		let rows = sqlx::query(
			"SELECT id, email, name, status, created_at, updated_at FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
		)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		rows.into_iter().map(row_to_user).collect()
	}

	pub async fn set_user_status(&self, user_id: Uuid, status: UserStatus) -> GatewayResult<()> {
		sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
			.bind(status.as_str())
			.bind(fmt_ts(Utc::now()))
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		Ok(())
	}

	// ---- api keys ---------------------------------------------------------

	pub async fn insert_key(
		&self,
		user_id: Uuid,
		key_hash: &str,
		prefix: &str,
		label: Option<&str>,
	) -> GatewayResult<ApiKey> {
		let id = Uuid::new_v4();
		let now = Utc::now();
		sqlx::query(
			"INSERT INTO api_keys (id, user_id, key_hash, prefix, label, status, created_at, last_used_at) VALUES (?, ?, ?, ?, ?, ?, ?, NULL)",
		)
		.bind(id.to_string())
		.bind(user_id.to_string())
		.bind(key_hash)
		.bind(prefix)
		.bind(label)
		.bind(KeyStatus::Active.as_str())
		.bind(fmt_ts(now))
		.execute(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		Ok(ApiKey {
			id,
			user_id,
			key_hash: key_hash.to_string(),
			prefix: prefix.to_string(),
			label: label.map(str::to_string),
			status: KeyStatus::Active,
			created_at: now,
			last_used_at: None,
		})
	}

	/// All active (non-revoked) keys whose stored prefix matches. More than
	/// one row can share a prefix in principle (12 chars of a high-entropy
	/// token collide only with negligible probability), so the caller tries
	/// each in turn.
	pub async fn find_active_keys_by_prefix(&self, prefix: &str) -> GatewayResult<Vec<ApiKey>> {
		let rows = sqlx::query(
			"SELECT id, user_id, key_hash, prefix, label, status, created_at, last_used_at FROM api_keys WHERE prefix = ? AND status = ?",
		)
		.bind(prefix)
		.bind(KeyStatus::Active.as_str())
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		rows.into_iter().map(row_to_key).collect()
	}

	pub async fn list_keys_for_user(&self, user_id: Uuid) -> GatewayResult<Vec<ApiKey>> {
		let rows = sqlx::query(
			"SELECT id, user_id, key_hash, prefix, label, status, created_at, last_used_at FROM api_keys WHERE user_id = ? ORDER BY created_at DESC",
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		rows.into_iter().map(row_to_key).collect()
	}

	pub async fn touch_key_last_used(&self, key_id: Uuid) -> GatewayResult<()> {
		sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
			.bind(fmt_ts(Utc::now()))
			.bind(key_id.to_string())
			.execute(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		Ok(())
	}

	pub async fn revoke_key(&self, key_id: Uuid) -> GatewayResult<bool> {
		let result = sqlx::query("UPDATE api_keys SET status = ? WHERE id = ? AND status = ?")
			.bind(KeyStatus::Revoked.as_str())
			.bind(key_id.to_string())
			.bind(KeyStatus::Active.as_str())
			.execute(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn revoke_all_keys_for_user(&self, user_id: Uuid) -> GatewayResult<()> {
		sqlx::query("UPDATE api_keys SET status = ? WHERE user_id = ? AND status = ?")
			.bind(KeyStatus::Revoked.as_str())
			.bind(user_id.to_string())
			.bind(KeyStatus::Active.as_str())
			.execute(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		Ok(())
	}

	// ---- quotas -----------------------------------------------------------

	pub async fn create_default_quota(
		&self,
		user_id: Uuid,
		defaults: &gateway_core::QuotaDefaults,
	) -> GatewayResult<UserQuota> {
		sqlx::query(
			"INSERT INTO user_quotas (user_id, daily_requests, daily_tokens, monthly_spend_cap_usd, max_concurrent_requests) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(user_id.to_string())
		.bind(defaults.daily_requests)
		.bind(defaults.daily_tokens)
		.bind(defaults.monthly_spend_cap_usd.map(|d| d.to_string()))
		.bind(5i32)
		.execute(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		Ok(UserQuota {
			user_id,
			daily_requests: defaults.daily_requests,
			daily_tokens: defaults.daily_tokens,
			monthly_spend_cap_usd: defaults.monthly_spend_cap_usd,
			max_concurrent_requests: 5,
		})
	}

	pub async fn get_quota(&self, user_id: Uuid) -> GatewayResult<Option<UserQuota>> {
		let row = sqlx::query(
			"SELECT user_id, daily_requests, daily_tokens, monthly_spend_cap_usd, max_concurrent_requests FROM user_quotas WHERE user_id = ?",
		)
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		row.map(row_to_quota).transpose()
	}

	/// Partial update: any field left `None` keeps its current value.
	pub async fn update_quota(
		&self,
		user_id: Uuid,
		daily_requests: Option<i64>,
		daily_tokens: Option<i64>,
		monthly_spend_cap_usd: Option<Option<Decimal>>,
		max_concurrent_requests: Option<i32>,
	) -> GatewayResult<Option<UserQuota>> {
		let Some(existing) = self.get_quota(user_id).await? else {
			return Ok(None);
		};
		let daily_requests = daily_requests.unwrap_or(existing.daily_requests);
		let daily_tokens = daily_tokens.unwrap_or(existing.daily_tokens);
		let monthly_spend_cap_usd =
			monthly_spend_cap_usd.unwrap_or(existing.monthly_spend_cap_usd);
		let max_concurrent_requests =
			max_concurrent_requests.unwrap_or(existing.max_concurrent_requests);
		sqlx::query(
			"UPDATE user_quotas SET daily_requests = ?, daily_tokens = ?, monthly_spend_cap_usd = ?, max_concurrent_requests = ? WHERE user_id = ?",
		)
		.bind(daily_requests)
		.bind(daily_tokens)
		.bind(monthly_spend_cap_usd.map(|d| d.to_string()))
		.bind(max_concurrent_requests)
		.bind(user_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		Ok(Some(UserQuota {
			user_id,
			daily_requests,
			daily_tokens,
			monthly_spend_cap_usd,
			max_concurrent_requests,
		}))
	}

	// ---- usage + aggregates -------------------------------------------------

	pub async fn daily_aggregate(&self, user_id: Uuid, date: NaiveDate) -> GatewayResult<DailyAggregate> {
		let row = sqlx::query(
			"SELECT request_count, total_tokens, total_cost_usd FROM daily_aggregates WHERE user_id = ? AND date = ?",
		)
		.bind(user_id.to_string())
		.bind(date.to_string())
		.fetch_optional(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		match row {
			None => Ok(DailyAggregate::default()),
			Some(row) => {
				let total_cost_usd: String = row.try_get("total_cost_usd").map_err(GatewayError::internal)?;
				Ok(DailyAggregate {
					request_count: row.try_get("request_count").map_err(GatewayError::internal)?,
					total_tokens: row.try_get("total_tokens").map_err(GatewayError::internal)?,
					total_cost_usd: parse_decimal(&total_cost_usd)?,
				})
			},
		}
	}

	/// Sum of daily aggregates for every day in `[start, end]` inclusive,
	/// across all three fields — used by the admin surface's usage stats.
	pub async fn aggregate_range(
		&self,
		user_id: Uuid,
		start: NaiveDate,
		end: NaiveDate,
	) -> GatewayResult<DailyAggregate> {
		let rows = sqlx::query(
			"SELECT request_count, total_tokens, total_cost_usd FROM daily_aggregates WHERE user_id = ? AND date >= ? AND date <= ?",
		)
		.bind(user_id.to_string())
		.bind(start.to_string())
		.bind(end.to_string())
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		let mut total = DailyAggregate::default();
		for row in rows {
			let cost: String = row.try_get("total_cost_usd").map_err(GatewayError::internal)?;
			total.request_count += row.try_get::<i64, _>("request_count").map_err(GatewayError::internal)?;
			total.total_tokens += row.try_get::<i64, _>("total_tokens").map_err(GatewayError::internal)?;
			total.total_cost_usd += parse_decimal(&cost)?;
		}
		Ok(total)
	}

	/// Sum of all daily aggregates ever recorded for the user — the
	/// all-time usage figure on the admin user-detail view.
	pub async fn all_time_aggregate(&self, user_id: Uuid) -> GatewayResult<DailyAggregate> {
		let row = sqlx::query(
			"SELECT COALESCE(SUM(request_count), 0) AS request_count, COALESCE(SUM(total_tokens), 0) AS total_tokens FROM daily_aggregates WHERE user_id = ?",
		)
		.bind(user_id.to_string())
		.fetch_one(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		let request_count: i64 = row.try_get("request_count").map_err(GatewayError::internal)?;
		let total_tokens: i64 = row.try_get("total_tokens").map_err(GatewayError::internal)?;

		let cost_rows = sqlx::query("SELECT total_cost_usd FROM daily_aggregates WHERE user_id = ?")
			.bind(user_id.to_string())
			.fetch_all(&self.pool)
			.await
			.map_err(GatewayError::internal)?;
		let mut total_cost_usd = Decimal::ZERO;
		for row in cost_rows {
			let s: String = row.try_get("total_cost_usd").map_err(GatewayError::internal)?;
			total_cost_usd += parse_decimal(&s)?;
		}
		Ok(DailyAggregate {
			request_count,
			total_tokens,
			total_cost_usd,
		})
	}

	/// Sum of daily aggregates for every day in `[start, end]` inclusive — used
	/// for month-to-date spend checks.
	pub async fn aggregate_range_cost(
		&self,
		user_id: Uuid,
		start: NaiveDate,
		end: NaiveDate,
	) -> GatewayResult<Decimal> {
		let rows = sqlx::query(
			"SELECT total_cost_usd FROM daily_aggregates WHERE user_id = ? AND date >= ? AND date <= ?",
		)
		.bind(user_id.to_string())
		.bind(start.to_string())
		.bind(end.to_string())
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		let mut total = Decimal::ZERO;
		for row in rows {
			let s: String = row.try_get("total_cost_usd").map_err(GatewayError::internal)?;
			total += parse_decimal(&s)?;
		}
		Ok(total)
	}

	/// Insert the usage record and upsert today's aggregate atomically. See
	/// the quota engine's `record` for why these two writes must never be
	/// observed independently.
	pub async fn record_usage(&self, rec: NewUsageRecord) -> GatewayResult<UsageRecord> {
		let id = Uuid::new_v4();
		let now = Utc::now();
		let date = now.with_timezone(&chrono::Local).date_naive();
		let total_tokens = rec.input_tokens + rec.output_tokens;

		let mut tx = self.pool.begin().await.map_err(GatewayError::internal)?;

		sqlx::query(
			"INSERT INTO usage_records (id, user_id, request_id, provider, model, input_tokens, output_tokens, cost_estimate_usd, latency_ms, status, error_message, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(id.to_string())
		.bind(rec.user_id.to_string())
		.bind(&rec.request_id)
		.bind(rec.provider.as_str())
		.bind(&rec.model)
		.bind(rec.input_tokens)
		.bind(rec.output_tokens)
		.bind(rec.cost_estimate_usd.to_string())
		.bind(rec.latency_ms)
		.bind(rec.status.as_str())
		.bind(&rec.error_message)
		.bind(fmt_ts(now))
		.execute(&mut *tx)
		.await
		.map_err(GatewayError::internal)?;

		let existing = sqlx::query(
			"SELECT request_count, total_tokens, total_cost_usd FROM daily_aggregates WHERE user_id = ? AND date = ?",
		)
		.bind(rec.user_id.to_string())
		.bind(date.to_string())
		.fetch_optional(&mut *tx)
		.await
		.map_err(GatewayError::internal)?;

		match existing {
			Some(row) => {
				let prior_count: i64 = row.try_get("request_count").map_err(GatewayError::internal)?;
				let prior_tokens: i64 = row.try_get("total_tokens").map_err(GatewayError::internal)?;
				let prior_cost: String = row.try_get("total_cost_usd").map_err(GatewayError::internal)?;
				let new_cost = parse_decimal(&prior_cost)? + rec.cost_estimate_usd;
				sqlx::query(
					"UPDATE daily_aggregates SET request_count = ?, total_tokens = ?, total_cost_usd = ? WHERE user_id = ? AND date = ?",
				)
				.bind(prior_count + 1)
				.bind(prior_tokens + total_tokens)
				.bind(new_cost.to_string())
				.bind(rec.user_id.to_string())
				.bind(date.to_string())
				.execute(&mut *tx)
				.await
				.map_err(GatewayError::internal)?;
			},
			None => {
				sqlx::query(
					"INSERT INTO daily_aggregates (user_id, date, request_count, total_tokens, total_cost_usd) VALUES (?, ?, 1, ?, ?)",
				)
				.bind(rec.user_id.to_string())
				.bind(date.to_string())
				.bind(total_tokens)
				.bind(rec.cost_estimate_usd.to_string())
				.execute(&mut *tx)
				.await
				.map_err(GatewayError::internal)?;
			},
		}

		tx.commit().await.map_err(GatewayError::internal)?;

		Ok(UsageRecord {
			id,
			user_id: rec.user_id,
			request_id: rec.request_id,
			provider: rec.provider,
			model: rec.model,
			input_tokens: rec.input_tokens,
			output_tokens: rec.output_tokens,
			cost_estimate_usd: rec.cost_estimate_usd,
			latency_ms: rec.latency_ms,
			status: rec.status,
			error_message: rec.error_message,
			created_at: now,
		})
	}

	pub async fn recent_usage(&self, user_id: Uuid, limit: i64) -> GatewayResult<Vec<UsageRecord>> {
		let limit = limit.clamp(1, 500);
		let rows = sqlx::query(
			"SELECT id, user_id, request_id, provider, model, input_tokens, output_tokens, cost_estimate_usd, latency_ms, status, error_message, created_at FROM usage_records WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
		)
		.bind(user_id.to_string())
		.bind(limit)
		.fetch_all(&self.pool)
		.await
		.map_err(GatewayError::internal)?;
		rows.into_iter().map(row_to_usage).collect()
	}
}

fn row_to_user(row: AnyRow) -> GatewayResult<User> {
	let id: String = row.try_get("id").map_err(GatewayError::internal)?;
	let status: String = row.try_get("status").map_err(GatewayError::internal)?;
	let created_at: String = row.try_get("created_at").map_err(GatewayError::internal)?;
	let updated_at: String = row.try_get("updated_at").map_err(GatewayError::internal)?;
	Ok(User {
		id: Uuid::parse_str(&id).map_err(GatewayError::internal)?,
		email: row.try_get("email").map_err(GatewayError::internal)?,
		name: row.try_get("name").map_err(GatewayError::internal)?,
		status: UserStatus::from_str(&status).map_err(|_| GatewayError::internal("bad user status"))?,
		created_at: parse_ts(&created_at)?,
		updated_at: parse_ts(&updated_at)?,
	})
}

fn row_to_key(row: AnyRow) -> GatewayResult<ApiKey> {
	let id: String = row.try_get("id").map_err(GatewayError::internal)?;
	let user_id: String = row.try_get("user_id").map_err(GatewayError::internal)?;
	let status: String = row.try_get("status").map_err(GatewayError::internal)?;
	let created_at: String = row.try_get("created_at").map_err(GatewayError::internal)?;
	let last_used_at: Option<String> = row.try_get("last_used_at").map_err(GatewayError::internal)?;
	Ok(ApiKey {
		id: Uuid::parse_str(&id).map_err(GatewayError::internal)?,
		user_id: Uuid::parse_str(&user_id).map_err(GatewayError::internal)?,
		key_hash: row.try_get("key_hash").map_err(GatewayError::internal)?,
		prefix: row.try_get("prefix").map_err(GatewayError::internal)?,
		label: row.try_get("label").map_err(GatewayError::internal)?,
		status: KeyStatus::from_str(&status).map_err(|_| GatewayError::internal("bad key status"))?,
		created_at: parse_ts(&created_at)?,
		last_used_at: last_used_at.map(|s| parse_ts(&s)).transpose()?,
	})
}

fn row_to_quota(row: AnyRow) -> GatewayResult<UserQuota> {
	let user_id: String = row.try_get("user_id").map_err(GatewayError::internal)?;
	let cap: Option<String> = row
		.try_get("monthly_spend_cap_usd")
		.map_err(GatewayError::internal)?;
	Ok(UserQuota {
		user_id: Uuid::parse_str(&user_id).map_err(GatewayError::internal)?,
		daily_requests: row.try_get("daily_requests").map_err(GatewayError::internal)?,
		daily_tokens: row.try_get("daily_tokens").map_err(GatewayError::internal)?,
		monthly_spend_cap_usd: cap.map(|s| parse_decimal(&s)).transpose()?,
		max_concurrent_requests: row
			.try_get("max_concurrent_requests")
			.map_err(GatewayError::internal)?,
	})
}

fn row_to_usage(row: AnyRow) -> GatewayResult<UsageRecord> {
	let id: String = row.try_get("id").map_err(GatewayError::internal)?;
	let user_id: String = row.try_get("user_id").map_err(GatewayError::internal)?;
	let provider: String = row.try_get("provider").map_err(GatewayError::internal)?;
	let status: String = row.try_get("status").map_err(GatewayError::internal)?;
	let created_at: String = row.try_get("created_at").map_err(GatewayError::internal)?;
	let cost: String = row
		.try_get("cost_estimate_usd")
		.map_err(GatewayError::internal)?;
	Ok(UsageRecord {
		id: Uuid::parse_str(&id).map_err(GatewayError::internal)?,
		user_id: Uuid::parse_str(&user_id).map_err(GatewayError::internal)?,
		request_id: row.try_get("request_id").map_err(GatewayError::internal)?,
		provider: Provider::from_str(&provider).unwrap_or(Provider::Unknown),
		model: row.try_get("model").map_err(GatewayError::internal)?,
		input_tokens: row.try_get("input_tokens").map_err(GatewayError::internal)?,
		output_tokens: row.try_get("output_tokens").map_err(GatewayError::internal)?,
		cost_estimate_usd: parse_decimal(&cost)?,
		latency_ms: row.try_get("latency_ms").map_err(GatewayError::internal)?,
		status: if status == "success" {
			UsageStatus::Success
		} else {
			UsageStatus::Error
		},
		error_message: row.try_get("error_message").map_err(GatewayError::internal)?,
		created_at: parse_ts(&created_at)?,
	})
}
