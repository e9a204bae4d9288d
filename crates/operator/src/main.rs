use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use operator::config::Config;
use operator::controller;
use operator::kube_client::init_kube_client;
use operator::scheduling_client::HttpSchedulingClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::logging::init();

    let config = Config::parse();

    tracing::info!(
        scheduler_url = %config.scheduler_url,
        "Starting carbon-aware operator"
    );

    let client = init_kube_client(config.kubeconfig.clone())
        .await
        .map_err(|report| anyhow!("failed to create Kubernetes client: {report:?}"))?;

    let scheduler = HttpSchedulingClient::new(config.scheduler_url.clone())
        .map_err(|report| anyhow!("failed to create scheduling client: {report:?}"))?;

    controller::run(client, Arc::new(scheduler)).await;

    tracing::info!("Controller stopped");
    Ok(())
}
