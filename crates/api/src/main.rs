use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let config = gatehouse_db::DbConfig::from_env().context("database configuration")?;
    let db = gatehouse_db::Db::connect(&config)
        .await
        .context("database connection")?;

    let registry = gatehouse_api::app::build_registry(&db).context("endpoint registration")?;
    tracing::info!(endpoints = ?registry.names(), "api registry ready");

    let stopped = Arc::new(AtomicBool::new(false));
    let app = gatehouse_api::app::build_app(Arc::new(registry), stopped.clone());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(stopped))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then flip the health flag so load balancers see "STOP"
/// while in-flight requests drain.
async fn shutdown_signal(stopped: Arc<AtomicBool>) {
    let _ = tokio::signal::ctrl_c().await;
    stopped.store(true, Ordering::Relaxed);
    tracing::info!("shutdown signal received; draining");
}
