//! `pressroom worklist`: operator actions on items

use console::style;

use crate::types::{DecisionKind, PressError, PublishProviderKind, Result, WorklistStatus};

pub async fn list(status: Option<String>, include_archived: bool) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let status = status
        .map(|s| s.parse::<WorklistStatus>())
        .transpose()
        .map_err(PressError::Config)?;

    let items = orchestrator
        .database()
        .list_worklist_items(status, include_archived)?;
    if items.is_empty() {
        println!("no worklist items");
        return Ok(());
    }
    println!(
        "{:>5}  {:<20} {:<24} {}",
        "id", "status", "document", "title"
    );
    for item in items {
        println!(
            "{:>5}  {:<20} {:<24} {}",
            item.id,
            item.status,
            item.document_id,
            item.title.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn show(id: i64) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let db = orchestrator.database();
    let item = db.get_worklist_item(id)?;

    println!("{} #{}", style("worklist item").bold(), item.id);
    println!("  document:  {}", item.document_id);
    println!("  status:    {}", item.status);
    println!("  synced:    {}", item.synced_at.to_rfc3339());
    if let Some(error) = &item.error_message {
        println!("  error:     {}", style(error).red());
    }
    for note in &item.notes {
        let marker = if note.is_override { "override" } else { "note" };
        println!("  {marker}: [{}] {}", note.author, note.text);
    }

    if let Some(article_id) = item.article_id {
        let article = db.get_article(article_id)?;
        println!("{} #{}", style("article").bold(), article.id);
        println!("  title:     {}", article.title.display());
        println!(
            "  parsed:    {} (confidence {:.2}{})",
            article.parsing_method,
            article.parsing_confidence,
            if article.parsing_confirmed {
                ", confirmed"
            } else {
                ""
            }
        );
        println!("  ai spend:  ${:.2}", article.generation_cost_usd);
        if let Some(url) = &article.published_url {
            println!("  draft:     {url}");
        }

        let issues = db.list_issues(article_id, false)?;
        let decisions = db.list_decisions(article_id, false)?;
        println!(
            "  issues:    {} open, {} decided",
            issues.len(),
            decisions.len()
        );
        for issue in issues.iter().take(20) {
            let decided = decisions.iter().any(|d| d.issue_id == issue.id);
            println!(
                "    [{}] {} {}..{} {:?} -> {:?}{}",
                issue.rule_code,
                issue.severity.as_str(),
                issue.start_offset,
                issue.end_offset,
                issue.original_text,
                issue.suggested_text.as_deref().unwrap_or("-"),
                if decided { " (decided)" } else { "" }
            );
        }
    }
    Ok(())
}

pub async fn confirm(id: i64, operator: &str) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    orchestrator.confirm_parsing(id, operator).await?;
    // One-shot process: run the queued stage inline instead of waiting
    // on resident workers
    orchestrator.run_job(crate::orchestrator::Job::proofread(id)).await;
    println!("{} item {id} confirmed", style("ok").green());
    Ok(())
}

pub async fn reparse(id: i64) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    orchestrator.request_reparse(id).await?;
    orchestrator.run_job(crate::orchestrator::Job::parse(id)).await;
    println!("{} item {id} re-parsed", style("ok").green());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn decide(
    id: i64,
    issue_id: i64,
    decision: &str,
    content: Option<String>,
    notes: Option<String>,
    operator: &str,
    supersede: bool,
) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let decision: DecisionKind = decision.parse().map_err(PressError::Config)?;
    let stored =
        orchestrator.submit_decision(id, issue_id, decision, content, notes, operator, supersede)?;
    println!(
        "{} decision #{} ({}) recorded on issue {}",
        style("ok").green(),
        stored.id,
        stored.decision.as_str(),
        issue_id
    );
    Ok(())
}

pub async fn finalize(id: i64, operator: &str) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    orchestrator.finalize_review(id, operator).await?;
    println!("{} item {id} finalized, ready to publish", style("ok").green());
    Ok(())
}

pub async fn publish(id: i64, provider: Option<String>) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let provider = provider
        .map(|p| p.parse::<PublishProviderKind>())
        .transpose()
        .map_err(PressError::Config)?;
    orchestrator.trigger_publish(id, provider).await?;
    orchestrator
        .run_job(crate::orchestrator::Job::publish(id, provider))
        .await;

    let item = orchestrator.database().get_worklist_item(id)?;
    match item.status {
        WorklistStatus::Published => {
            let article = orchestrator
                .database()
                .get_article(item.article_id.unwrap_or_default())?;
            println!(
                "{} draft created: {}",
                style("published").green().bold(),
                article.published_url.as_deref().unwrap_or("-")
            );
        }
        other => println!("item {id} is now {other}"),
    }
    Ok(())
}

pub async fn reset(id: i64, to: &str, operator: &str, note: &str) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let to: WorklistStatus = to.parse().map_err(PressError::Config)?;
    orchestrator.reset_failed(id, to, operator, note).await?;
    println!("{} item {id} reset to {to}", style("ok").green());
    Ok(())
}

pub async fn cancel(id: i64) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    orchestrator.cancel_item(id);
    println!("cancellation requested for item {id}");
    Ok(())
}

pub async fn raise_cap(article_id: i64, cap_usd: f64) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    orchestrator.raise_cost_cap(article_id, cap_usd)?;
    println!(
        "{} cost cap for article {article_id} raised to ${cap_usd:.2}",
        style("ok").green()
    );
    Ok(())
}

