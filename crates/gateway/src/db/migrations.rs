/// Schema version this binary knows how to run against. Bump alongside a new
/// entry in [`MIGRATIONS`]; an older binary refuses to start against a
/// schema newer than it understands (see [`super::Db::migrate`]).
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Ordered, idempotent migrations, one slice of statements per schema
/// version (1-based index == version). Columns that hold ids, timestamps,
/// and monetary amounts are stored as TEXT: the gateway supports both an
/// embedded and a server backend behind one query surface (see
/// DESIGN.md), and TEXT is the one representation both drivers agree on
/// without backend-specific bind types, while still giving full decimal
/// precision for cost accounting.
pub const MIGRATIONS: &[&[&str]] = &[&[
	"CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
	r#"CREATE TABLE IF NOT EXISTS users (
		id TEXT PRIMARY KEY,
		email TEXT UNIQUE,
		name TEXT,
		status TEXT NOT NULL,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)"#,
	r#"CREATE TABLE IF NOT EXISTS api_keys (
		id TEXT PRIMARY KEY,
		user_id TEXT NOT NULL,
		key_hash TEXT NOT NULL,
		prefix TEXT NOT NULL,
		label TEXT,
		status TEXT NOT NULL,
		created_at TEXT NOT NULL,
		last_used_at TEXT
	)"#,
	"CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys (prefix)",
	"CREATE INDEX IF NOT EXISTS idx_api_keys_user_id ON api_keys (user_id)",
	r#"CREATE TABLE IF NOT EXISTS user_quotas (
		user_id TEXT PRIMARY KEY,
		daily_requests INTEGER NOT NULL,
		daily_tokens INTEGER NOT NULL,
		monthly_spend_cap_usd TEXT,
		max_concurrent_requests INTEGER NOT NULL
	)"#,
	r#"CREATE TABLE IF NOT EXISTS usage_records (
		id TEXT PRIMARY KEY,
		user_id TEXT NOT NULL,
		request_id TEXT NOT NULL,
		provider TEXT NOT NULL,
		model TEXT NOT NULL,
		input_tokens INTEGER NOT NULL,
		output_tokens INTEGER NOT NULL,
		cost_estimate_usd TEXT NOT NULL,
		latency_ms INTEGER NOT NULL,
		status TEXT NOT NULL,
		error_message TEXT,
		created_at TEXT NOT NULL
	)"#,
	"CREATE INDEX IF NOT EXISTS idx_usage_user_id ON usage_records (user_id)",
	"CREATE INDEX IF NOT EXISTS idx_usage_user_id_created_at ON usage_records (user_id, created_at)",
	r#"CREATE TABLE IF NOT EXISTS daily_aggregates (
		user_id TEXT NOT NULL,
		date TEXT NOT NULL,
		request_count INTEGER NOT NULL,
		total_tokens INTEGER NOT NULL,
		total_cost_usd TEXT NOT NULL,
		PRIMARY KEY (user_id, date)
	)"#,
]];
