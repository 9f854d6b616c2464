use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Installs a JSON-formatted subscriber driven by `LOG_LEVEL`, falling back
/// to `info` for any target the level string doesn't cover. Request-scoped
/// fields (request_id, user_id) are attached by the pipeline's tracing span,
/// not here; this only sets up the sink and the default filter.
pub fn init(log_level: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.json()
		.with_env_filter(filter)
		.with_span_events(FmtSpan::CLOSE)
		.with_target(true)
		.init();
}
