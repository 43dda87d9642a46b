use std::net::SocketAddr;

use tessera_api::setup::{build_router, build_state};
use tessera_core::Config;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tessera_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let port = config.server_port;

    let state = build_state(config).await?;
    let queue = state.queue.clone();
    let app = build_router(state);

    // Workers share the process; the watch channel stops them on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(queue.run(shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = worker.await;
    Ok(())
}
