//! `pressroom run`: the orchestrator loop

use tracing::info;

use crate::orchestrator::CancellationToken;
use crate::types::Result;

pub async fn run() -> Result<()> {
    let (config, orchestrator) = super::bootstrap()?;

    info!(
        sync_interval = config.orchestrator.sync_interval_seconds,
        folder = %config.orchestrator.sync_folder,
        "starting orchestrator"
    );

    let workers = orchestrator.clone().start_workers().await;

    let shutdown = CancellationToken::new();
    let loop_handle = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { orchestrator.run_loop(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.cancel();

    let _ = loop_handle.await;
    for worker in &workers {
        worker.abort();
    }
    let _ = futures::future::join_all(workers).await;
    Ok(())
}
