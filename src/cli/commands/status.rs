//! `pressroom status`: lane counts and AI spend

use console::style;

use crate::types::{Result, WorklistStatus};

pub async fn run() -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let db = orchestrator.database();

    println!("{}", style("worklist").bold());
    let items = db.list_worklist_items(None, false)?;
    for status in WorklistStatus::ALL {
        let count = items.iter().filter(|i| i.status == status).count();
        if count > 0 {
            println!("  {:<20} {}", status.to_string(), count);
        }
    }
    if items.is_empty() {
        println!("  (empty)");
    }

    let total_spend: f64 = items
        .iter()
        .filter_map(|item| item.article_id)
        .filter_map(|id| db.get_article(id).ok())
        .map(|a| a.generation_cost_usd)
        .sum();
    println!();
    println!("{}", style("ai usage").bold());
    println!("  booked spend         ${total_spend:.2}");
    let summary = orchestrator.metrics().summary();
    println!("  session calls        {}", summary.api_calls);
    println!(
        "  session tokens       {} in / {} out",
        summary.input_tokens, summary.output_tokens
    );
    println!("  session spend        ${:.4}", summary.total_cost_usd);

    if let Some((ruleset, rules)) = db.active_ruleset()? {
        println!();
        println!("{}", style("proofreading").bold());
        println!(
            "  active ruleset       {} (generation {}, {} rules)",
            ruleset.version,
            ruleset.generation,
            rules.len()
        );
    }
    Ok(())
}
