use anyhow::Context;

use gridcast_infra::GridcastConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GridcastConfig::load().context("loading configuration")?;
    gridcast_observability::init_with(config.log_format);

    let bind_addr = config.bind_addr.clone();
    let node = gridcast_api::services::build_node(config).await?;
    let workers = node.start_drift_workers()?;

    let app = gridcast_api::build_app(node);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for worker in workers {
        worker.shutdown();
    }
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = ?e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
