use std::net::SocketAddr;

use gateway_core::Config;
use llm_gateway::context::Gateway;

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	let config = match Config::from_env() {
		Ok(c) => c,
		Err(e) => {
			eprintln!("configuration error: {e}");
			std::process::exit(1);
		},
	};

	llm_gateway::telemetry::init(&config.log_level);

	let host = config.host.clone();
	let port = config.port;

	let gateway = match Gateway::bootstrap(config).await {
		Ok(g) => g,
		Err(e) => {
			tracing::error!(error = %e, "failed to start gateway");
			std::process::exit(1);
		},
	};

	let app = llm_gateway::app(gateway);

	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.unwrap_or_else(|_| ([0, 0, 0, 0], port).into());

	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!(error = %e, %addr, "failed to bind listener");
			std::process::exit(1);
		},
	};

	tracing::info!(%addr, "gateway listening");

	let result = axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await;

	if let Err(e) = result {
		tracing::error!(error = %e, "server exited with error");
		std::process::exit(1);
	}
}

/// Waits for SIGINT or, on unix, SIGTERM. `axum::serve`'s graceful shutdown
/// stops accepting new connections and drains in-flight requests before
/// this future's caller returns, which is the draining behavior the
/// process's exit contract requires.
async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	tracing::info!("shutdown signal received, draining in-flight requests");
}
