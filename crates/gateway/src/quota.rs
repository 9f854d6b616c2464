//! Quota Engine (C3): pre-flight admission against persisted aggregates plus
//! an in-memory concurrency counter, and post-flight usage recording that
//! always runs regardless of how the downstream call turned out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use gateway_core::{GatewayError, GatewayResult, Provider, QuotaDimension, UsageStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Db;
use crate::db::models::{NewUsageRecord, UsageRecord};

/// Process-local, not persisted: reset on restart. Each admitted request
/// increments exactly once and is matched by exactly one decrement,
/// enforced by [`ConcurrencyGuard`].
#[derive(Clone, Default, Debug)]
pub struct ConcurrencyCounters {
	inner: Arc<Mutex<HashMap<Uuid, i32>>>,
}

impl ConcurrencyCounters {
	fn current(&self, user_id: Uuid) -> i32 {
		*self.inner.lock().unwrap().get(&user_id).unwrap_or(&0)
	}

	fn increment(&self, user_id: Uuid) {
		*self.inner.lock().unwrap().entry(user_id).or_insert(0) += 1;
	}

	/// Floor of 0 so a double-release on an edge path can never go negative.
	fn decrement(&self, user_id: Uuid) {
		let mut map = self.inner.lock().unwrap();
		if let Some(count) = map.get_mut(&user_id) {
			*count = (*count - 1).max(0);
		}
	}

	#[cfg(test)]
	pub fn get(&self, user_id: Uuid) -> i32 {
		self.current(user_id)
	}
}

/// Releases the concurrency counter exactly once, whether released
/// explicitly or dropped (covers early `?` returns and panics unwinding
/// through the handler).
#[derive(Debug)]
pub struct ConcurrencyGuard {
	counters: ConcurrencyCounters,
	user_id: Uuid,
	released: AtomicBool,
}

impl ConcurrencyGuard {
	pub fn release(&self) {
		if !self.released.swap(true, Ordering::SeqCst) {
			self.counters.decrement(self.user_id);
		}
	}
}

impl Drop for ConcurrencyGuard {
	fn drop(&mut self) {
		self.release();
	}
}

pub struct QuotaInspection {
	pub daily_requests_limit: i64,
	pub daily_requests_used: i64,
	pub daily_tokens_limit: i64,
	pub daily_tokens_used: i64,
	pub monthly_spend_cap_usd: Option<Decimal>,
	pub monthly_spend_used_usd: Decimal,
}

#[derive(Clone)]
pub struct QuotaEngine {
	db: Db,
	counters: ConcurrencyCounters,
}

fn today_local() -> NaiveDate {
	Local::now().date_naive()
}

fn next_local_midnight() -> DateTime<Utc> {
	let tomorrow = today_local().succ_opt().expect("date overflow");
	let local_midnight = Local
		.from_local_datetime(&tomorrow.and_hms_opt(0, 0, 0).expect("valid time"))
		.single()
		.expect("unambiguous local midnight");
	local_midnight.with_timezone(&Utc)
}

fn first_of_next_month() -> DateTime<Utc> {
	let today = today_local();
	let (year, month) = if today.month() == 12 {
		(today.year() + 1, 1)
	} else {
		(today.year(), today.month() + 1)
	};
	let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid date");
	let local_midnight = Local
		.from_local_datetime(&first.and_hms_opt(0, 0, 0).expect("valid time"))
		.single()
		.expect("unambiguous local midnight");
	local_midnight.with_timezone(&Utc)
}

impl QuotaEngine {
	pub fn new(db: Db) -> Self {
		Self {
			db,
			counters: ConcurrencyCounters::default(),
		}
	}

	#[cfg(test)]
	pub fn counters(&self) -> &ConcurrencyCounters {
		&self.counters
	}

	/// Evaluate admission in the order mandated by the gateway's admission
	/// contract: the first failing check wins and later checks are skipped.
	/// On success the concurrency counter has already been incremented;
	/// the returned guard is responsible for releasing it.
	pub async fn admit(&self, user_id: Uuid) -> GatewayResult<ConcurrencyGuard> {
		let quota = self
			.db
			.get_quota(user_id)
			.await?
			.ok_or_else(|| GatewayError::internal("user has no quota row"))?;

		let today = today_local();
		let aggregate = self.db.daily_aggregate(user_id, today).await?;

		if aggregate.request_count >= quota.daily_requests {
			return Err(GatewayError::QuotaExceeded {
				dimension: QuotaDimension::DailyRequests,
				limit: quota.daily_requests,
				used: aggregate.request_count,
				resets_at: next_local_midnight(),
			});
		}
		if aggregate.total_tokens >= quota.daily_tokens {
			return Err(GatewayError::QuotaExceeded {
				dimension: QuotaDimension::DailyTokens,
				limit: quota.daily_tokens,
				used: aggregate.total_tokens,
				resets_at: next_local_midnight(),
			});
		}
		if let Some(cap) = quota.monthly_spend_cap_usd {
			let today = today_local();
			let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).expect("valid date");
			let spend = self
				.db
				.aggregate_range_cost(user_id, month_start, today)
				.await?;
			if spend >= cap {
				return Err(GatewayError::QuotaExceeded {
					dimension: QuotaDimension::MonthlySpend,
					limit: cap.round_dp(0).try_into().unwrap_or(i64::MAX),
					used: spend.round_dp(0).try_into().unwrap_or(i64::MAX),
					resets_at: first_of_next_month(),
				});
			}
		}

		if self.counters.current(user_id) >= quota.max_concurrent_requests {
			return Err(GatewayError::TooManyConcurrent {
				limit: quota.max_concurrent_requests,
			});
		}

		self.counters.increment(user_id);
		Ok(ConcurrencyGuard {
			counters: self.counters.clone(),
			user_id,
			released: AtomicBool::new(false),
		})
	}

	/// Always runs for an admitted request, success or failure. Releases the
	/// concurrency counter even if the insert/upsert transaction fails.
	pub async fn record(
		&self,
		guard: &ConcurrencyGuard,
		user_id: Uuid,
		request_id: &str,
		provider: Provider,
		model: &str,
		input_tokens: i64,
		output_tokens: i64,
		latency_ms: i64,
		status: UsageStatus,
		error_message: Option<String>,
	) -> GatewayResult<UsageRecord> {
		let cost_estimate_usd = gateway_core::pricing::estimate_cost(
			provider.as_str(),
			model,
			input_tokens.max(0) as u64,
			output_tokens.max(0) as u64,
		);
		let result = self
			.db
			.record_usage(NewUsageRecord {
				user_id,
				request_id: request_id.to_string(),
				provider,
				model: model.to_string(),
				input_tokens,
				output_tokens,
				cost_estimate_usd,
				latency_ms,
				status,
				error_message,
			})
			.await;
		guard.release();
		result
	}

	pub async fn inspect(&self, user_id: Uuid) -> GatewayResult<QuotaInspection> {
		let quota = self
			.db
			.get_quota(user_id)
			.await?
			.ok_or_else(|| GatewayError::internal("user has no quota row"))?;
		let today = today_local();
		let aggregate = self.db.daily_aggregate(user_id, today).await?;
		let monthly_spend_used_usd = match quota.monthly_spend_cap_usd {
			Some(_) => {
				let month_start =
					NaiveDate::from_ymd_opt(today.year(), today.month(), 1).expect("valid date");
				self.db.aggregate_range_cost(user_id, month_start, today).await?
			},
			None => Decimal::ZERO,
		};
		Ok(QuotaInspection {
			daily_requests_limit: quota.daily_requests,
			daily_requests_used: aggregate.request_count,
			daily_tokens_limit: quota.daily_tokens,
			daily_tokens_used: aggregate.total_tokens,
			monthly_spend_cap_usd: quota.monthly_spend_cap_usd,
			monthly_spend_used_usd,
		})
	}
}

#[cfg(test)]
mod tests {
	use gateway_core::{PersistenceTarget, QuotaDefaults};

	use super::*;

	async fn test_db() -> (Db, tempfile::TempPath) {
		let file = tempfile::NamedTempFile::new().expect("temp file");
		let path = file.path().to_str().unwrap().to_string();
		let db = Db::connect(&PersistenceTarget::Sqlite(path))
			.await
			.expect("db connects and migrates");
		(db, file.into_temp_path())
	}

	async fn user_with_quota(db: &Db, defaults: QuotaDefaults) -> Uuid {
		let user = db.create_user(None, None).await.expect("create user");
		db.create_default_quota(user.id, &defaults).await.expect("create quota");
		user.id
	}

	#[tokio::test]
	async fn daily_requests_checked_before_daily_tokens() {
		let (db, _tmp) = test_db().await;
		let user_id = user_with_quota(
			&db,
			QuotaDefaults {
				daily_requests: 0,
				daily_tokens: 1000,
				monthly_spend_cap_usd: None,
			},
		)
		.await;
		let engine = QuotaEngine::new(db);
		match engine.admit(user_id).await {
			Err(GatewayError::QuotaExceeded { dimension, .. }) => {
				assert_eq!(dimension.as_str(), "daily_requests");
			},
			other => panic!("expected daily_requests quota_exceeded, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn concurrency_checked_last_and_counts_admitted_requests() {
		let (db, _tmp) = test_db().await;
		let user_id = user_with_quota(
			&db,
			QuotaDefaults {
				daily_requests: 1000,
				daily_tokens: 100_000,
				monthly_spend_cap_usd: None,
			},
		)
		.await;
		// max_concurrent_requests defaults to 5 in create_default_quota.
		let engine = QuotaEngine::new(db);
		let mut guards = Vec::new();
		for _ in 0..5 {
			guards.push(engine.admit(user_id).await.expect("admits within concurrency cap"));
		}
		match engine.admit(user_id).await {
			Err(GatewayError::TooManyConcurrent { limit }) => assert_eq!(limit, 5),
			other => panic!("expected too_many_concurrent, got {other:?}"),
		}
		assert_eq!(engine.counters().get(user_id), 5);

		guards.pop().unwrap().release();
		assert_eq!(engine.counters().get(user_id), 4);
		engine.admit(user_id).await.expect("slot freed by release");
	}

	#[tokio::test]
	async fn guard_release_is_idempotent_across_explicit_and_drop() {
		let (db, _tmp) = test_db().await;
		let user_id = user_with_quota(
			&db,
			QuotaDefaults {
				daily_requests: 1000,
				daily_tokens: 100_000,
				monthly_spend_cap_usd: None,
			},
		)
		.await;
		let engine = QuotaEngine::new(db);
		let guard = engine.admit(user_id).await.unwrap();
		assert_eq!(engine.counters().get(user_id), 1);
		guard.release();
		guard.release();
		assert_eq!(engine.counters().get(user_id), 0, "double release must not go negative");
		drop(guard);
		assert_eq!(engine.counters().get(user_id), 0, "drop after explicit release is a no-op");
	}

	#[tokio::test]
	async fn record_releases_guard_even_when_insert_would_fail_downstream() {
		let (db, _tmp) = test_db().await;
		let user_id = user_with_quota(
			&db,
			QuotaDefaults {
				daily_requests: 1000,
				daily_tokens: 100_000,
				monthly_spend_cap_usd: None,
			},
		)
		.await;
		let engine = QuotaEngine::new(db);
		let guard = engine.admit(user_id).await.unwrap();
		assert_eq!(engine.counters().get(user_id), 1);
		engine
			.record(
				&guard,
				user_id,
				"req-1",
				Provider::OpenAi,
				"gpt-4o-mini",
				100,
				50,
				250,
				UsageStatus::Success,
				None,
			)
			.await
			.expect("record succeeds");
		assert_eq!(engine.counters().get(user_id), 0);
	}

	#[test]
	fn next_local_midnight_is_in_the_future() {
		assert!(next_local_midnight() > Utc::now());
	}

	#[test]
	fn first_of_next_month_is_further_out_than_next_midnight() {
		assert!(first_of_next_month() >= next_local_midnight());
	}
}
