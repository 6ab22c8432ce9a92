//! HTTP entry point for the orchestrator: wires config, dependencies, and
//! routes, then serves until SIGINT/SIGTERM.

mod config;
mod routes;
mod state;
mod tools;

use std::sync::Arc;

use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = config::Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let app_state = Arc::new(state::build(config).await?);

    let app = routes::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(5)))
        .layer(CompressionLayer::new());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("orchestrator listening on {}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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

    tracing::info!("shutting down");
}
