use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use scheduler::api::ApiServer;
use scheduler::api::AppState;
use scheduler::config::Config;
use scheduler::forecast::WattTimeProvider;
use scheduler::zones::StaticZoneLookup;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::logging::init();

    let config = Config::parse();

    let provider = WattTimeProvider::with_base_url(
        config.watttime_username.clone(),
        config.watttime_password.clone(),
        config.watttime_base_url.clone(),
    )
    .map_err(|report| anyhow!("failed to create WattTime client: {report:?}"))?;

    let state = Arc::new(AppState::new(
        Arc::new(provider),
        Arc::new(StaticZoneLookup::new()),
    ));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
        }
        let _ = shutdown_tx.send(());
    });

    let listen_addr = format!("0.0.0.0:{}", config.port);
    ApiServer::new(state, listen_addr)
        .run(shutdown_rx)
        .await
        .map_err(|report| anyhow!("API server failed: {report:?}"))
}
