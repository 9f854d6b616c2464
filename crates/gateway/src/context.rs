//! The explicit context threaded through the pipeline instead of module
//! globals: one `Gateway` holds the pool, key store, quota engine, provider
//! router, rate limiter, and config, and is handed to every handler via
//! axum `State`.

use std::sync::Arc;

use gateway_core::Config;

use crate::db::Db;
use crate::keystore::KeyStore;
use crate::llm::ProviderRouter;
use crate::quota::QuotaEngine;
use crate::ratelimit::AdmissionRateLimiter;

pub struct Gateway {
	pub config: Arc<Config>,
	pub db: Db,
	pub keystore: KeyStore,
	pub quota: QuotaEngine,
	pub router: ProviderRouter,
	pub admission_limiter: AdmissionRateLimiter,
}

impl Gateway {
	pub async fn bootstrap(config: Config) -> anyhow::Result<Arc<Self>> {
		let config = Arc::new(config);
		let db = Db::connect(&config.persistence).await?;
		let keystore = KeyStore::new(db.clone());
		let quota = QuotaEngine::new(db.clone());
		let router = ProviderRouter::new(config.clone());
		let admission_limiter = AdmissionRateLimiter::new(
			config.rate_limit_max,
			std::time::Duration::from_millis(config.rate_limit_window_ms),
		);
		Ok(Arc::new(Gateway {
			config,
			db,
			keystore,
			quota,
			router,
			admission_limiter,
		}))
	}
}
