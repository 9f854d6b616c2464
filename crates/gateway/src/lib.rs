pub mod admin;
pub mod context;
pub mod db;
pub mod http;
pub mod keystore;
pub mod llm;
pub mod quota;
pub mod ratelimit;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::response::IntoResponse;
use context::Gateway;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full HTTP surface: end-user routes at the root, admin
/// routes nested under `/admin`, wrapped in tracing, a panic catcher that
/// converts an unwind into `internal_error` instead of tearing down the
/// connection, and a blanket per-request timeout as a last-resort backstop
/// above the provider router's own per-call timeouts.
pub fn app(gateway: Arc<Gateway>) -> Router {
	let admin_router = admin::router().route_layer(middleware::from_fn_with_state(
		gateway.clone(),
		admin::require_operator_token,
	));
	Router::new()
		.merge(http::router())
		.nest("/admin", admin_router)
		.layer(TimeoutLayer::new(Duration::from_secs(150)))
		.layer(CatchPanicLayer::custom(handle_panic))
		.layer(TraceLayer::new_for_http())
		.with_state(gateway)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
	let message = if let Some(s) = err.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = err.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	};
	tracing::error!(panic = %message, "request handler panicked");
	gateway_core::GatewayError::internal(message).into_response()
}
