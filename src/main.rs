use clap::Parser;
use ingest_pipeline::config::AppConfig;
use ingest_pipeline::pipeline::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    fmt().with_env_filter(filter).with_target(true).init();

    tracing::info!("Starting ingest pipeline on {}", config.bind);
    tracing::info!(
        topic = %config.topic,
        queue = %config.queue,
        workers = config.workers,
        dedup_key = ?config.dedup_key,
        "Pipeline configuration"
    );

    // 1. Components:
    let pipeline = Pipeline::from_config(&config);

    // 2. Background tasks (sweeper + consumer workers):
    let shutdown = CancellationToken::new();
    let background =
        pipeline.spawn_background(config.workers, config.sweep_interval(), &shutdown);

    // 3. HTTP Router:
    let app = pipeline.router();

    // 4. Start HTTP server:
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Received Ctrl+C, initiating shutdown...");
            server_shutdown.cancel();
        })
        .await?;

    // The server can also stop on its own; make sure the workers follow.
    shutdown.cancel();
    for handle in background {
        handle.await?;
    }

    let stats = pipeline.queue.stats();
    tracing::info!(
        pending = stats.pending,
        in_flight = stats.in_flight,
        dead_lettered = stats.dead_lettered,
        "Shutdown complete"
    );

    Ok(())
}
