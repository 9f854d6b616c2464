use std::sync::Arc;

use gateway_core::{Config, PersistenceTarget, ProviderModels, QuotaDefaults};
use llm_gateway::context::Gateway;

/// Builds a gateway backed by its own temp-file SQLite database, with
/// permissive defaults. `customize` gets a mutable reference before the
/// gateway is bootstrapped, so individual tests can shrink a quota or drop
/// a provider credential.
pub async fn test_gateway(
	customize: impl FnOnce(&mut Config),
) -> (Arc<Gateway>, tempfile::TempPath) {
	let file = tempfile::NamedTempFile::new().expect("temp db file");
	let path = file.path().to_str().unwrap().to_string();

	let mut config = Config {
		host: "127.0.0.1".to_string(),
		port: 0,
		persistence: PersistenceTarget::Sqlite(path),
		openai_api_key: Some("sk-test-openai".to_string()),
		anthropic_api_key: Some("sk-test-anthropic".to_string()),
		openai_models: ProviderModels {
			allowed: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
			default: "gpt-4o-mini".to_string(),
		},
		anthropic_models: ProviderModels {
			allowed: vec!["claude-3-5-haiku-20241022".to_string()],
			default: "claude-3-5-haiku-20241022".to_string(),
		},
		admin_token: "test-admin-token-0123456789".to_string(),
		rate_limit_max: 1000,
		rate_limit_window_ms: 60_000,
		quota_defaults: QuotaDefaults {
			daily_requests: 1000,
			daily_tokens: 100_000,
			monthly_spend_cap_usd: None,
		},
		log_level: "error".to_string(),
		log_prompts: false,
	};
	customize(&mut config);

	let gateway = Gateway::bootstrap(config).await.expect("gateway bootstraps");
	(gateway, file.into_temp_path())
}

/// Creates an active user with a default quota and one active key, returning
/// the user id and the plaintext bearer token.
pub async fn seed_user(gw: &Arc<Gateway>) -> (uuid::Uuid, String) {
	let user = gw.db.create_user(None, None).await.expect("create user");
	gw.db
		.create_default_quota(user.id, &gw.config.quota_defaults)
		.await
		.expect("create quota");
	let created = gw
		.keystore
		.create_key(user.id, Some("test key"))
		.await
		.expect("create key");
	(user.id, created.plaintext.expose().to_string())
}
