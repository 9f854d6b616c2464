use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::env;

/// Where usage records and user state are durably stored. `Server` is chosen
/// whenever `DATABASE_URL` is set; otherwise the gateway falls back to the
/// embedded `Sqlite` backend rooted at `SQLITE_PATH`.
#[derive(Debug, Clone)]
pub enum PersistenceTarget {
	Sqlite(String),
	Server(String),
}

#[derive(Debug, Clone)]
pub struct QuotaDefaults {
	pub daily_requests: i64,
	pub daily_tokens: i64,
	pub monthly_spend_cap_usd: Option<Decimal>,
}

/// A provider's static model allowlist and default lightweight model, used
/// by the provider router's selection step. Not read from the environment —
/// these are compiled-in per the gateway's supported model set.
#[derive(Debug, Clone)]
pub struct ProviderModels {
	pub allowed: Vec<String>,
	pub default: String,
}

#[derive(Debug, Clone)]
pub struct Config {
	pub host: String,
	pub port: u16,
	pub persistence: PersistenceTarget,
	pub openai_api_key: Option<String>,
	pub anthropic_api_key: Option<String>,
	pub openai_models: ProviderModels,
	pub anthropic_models: ProviderModels,
	pub admin_token: String,
	pub rate_limit_max: u32,
	pub rate_limit_window_ms: u64,
	pub quota_defaults: QuotaDefaults,
	pub log_level: String,
	pub log_prompts: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("ADMIN_TOKEN must be set and at least 16 characters")]
	MissingOrShortAdminToken,
	#[error("at least one of OPENAI_API_KEY or ANTHROPIC_API_KEY must be set")]
	NoProviderCredentials,
	#[error("invalid numeric value for {0}: {1}")]
	InvalidNumber(&'static str, String),
}

impl Config {
	/// Load configuration from the process environment, matching the keys
	/// documented in the gateway's external-interface contract. Validation
	/// failures here are meant to be fatal at startup (exit code 1), never
	/// silently defaulted for the security-sensitive fields.
	pub fn from_env() -> Result<Self, ConfigError> {
		let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
		let port = parse_env("PORT", 3100)?;

		let persistence = match env::var("DATABASE_URL") {
			Ok(url) if !url.trim().is_empty() => PersistenceTarget::Server(url),
			_ => {
				let path = env::var("SQLITE_PATH").unwrap_or_else(|_| "gateway.sqlite3".to_string());
				PersistenceTarget::Sqlite(path)
			},
		};

		let openai_api_key = non_empty_env("OPENAI_API_KEY");
		let anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
		if openai_api_key.is_none() && anthropic_api_key.is_none() {
			return Err(ConfigError::NoProviderCredentials);
		}

		let admin_token = env::var("ADMIN_TOKEN").unwrap_or_default();
		if admin_token.len() < 16 {
			return Err(ConfigError::MissingOrShortAdminToken);
		}

		let rate_limit_max = parse_env("RATE_LIMIT_MAX", 60u32)?;
		let rate_limit_window_ms = parse_env("RATE_LIMIT_WINDOW_MS", 60_000u64)?;

		let default_daily_requests = parse_env("DEFAULT_DAILY_REQUESTS", 1000i64)?;
		let default_daily_tokens = parse_env("DEFAULT_DAILY_TOKENS", 100_000i64)?;
		let monthly_spend_cap_usd = match env::var("DEFAULT_MONTHLY_SPEND_CAP_USD") {
			Ok(v) if !v.trim().is_empty() => Some(
				Decimal::from_f64(
					v
						.parse::<f64>()
						.map_err(|_| ConfigError::InvalidNumber("DEFAULT_MONTHLY_SPEND_CAP_USD", v))?,
				)
				.unwrap_or(Decimal::ZERO),
			),
			_ => None,
		};

		let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
		let log_prompts = env::var("LOG_PROMPTS")
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
			.unwrap_or(false);

		Ok(Config {
			host,
			port,
			persistence,
			openai_api_key,
			anthropic_api_key,
			openai_models: ProviderModels {
				allowed: vec![
					"gpt-4o".to_string(),
					"gpt-4o-mini".to_string(),
					"gpt-4-turbo".to_string(),
					"gpt-3.5-turbo".to_string(),
				],
				default: "gpt-4o-mini".to_string(),
			},
			anthropic_models: ProviderModels {
				allowed: vec![
					"claude-3-5-sonnet-20241022".to_string(),
					"claude-3-5-haiku-20241022".to_string(),
					"claude-3-opus-20240229".to_string(),
				],
				default: "claude-3-5-haiku-20241022".to_string(),
			},
			admin_token,
			rate_limit_max,
			rate_limit_window_ms,
			quota_defaults: QuotaDefaults {
				daily_requests: default_daily_requests,
				daily_tokens: default_daily_tokens,
				monthly_spend_cap_usd,
			},
			log_level,
			log_prompts,
		})
	}
}

fn non_empty_env(key: &str) -> Option<String> {
	env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
	T: std::str::FromStr,
{
	match env::var(key) {
		Ok(v) if !v.trim().is_empty() => v
			.parse::<T>()
			.map_err(|_| ConfigError::InvalidNumber(key, v)),
		_ => Ok(default),
	}
}
