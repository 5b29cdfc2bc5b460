//! `pressroom sync`: one document-store round

use console::style;

use crate::types::Result;

pub async fn run() -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let report = orchestrator.sync_once().await?;
    orchestrator.kick_pending();

    // One-shot process: run the kicked parse jobs inline
    let parsing = orchestrator
        .database()
        .list_worklist_items(Some(crate::types::WorklistStatus::Parsing), false)?;
    for item in parsing {
        orchestrator
            .run_job(crate::orchestrator::Job::parse(item.id))
            .await;
    }

    println!(
        "{}: {} discovered, {} refreshed, {} flagged in review, {} unchanged",
        style("sync").green(),
        report.discovered,
        report.refreshed,
        report.flagged_in_review,
        report.unchanged
    );
    Ok(())
}
