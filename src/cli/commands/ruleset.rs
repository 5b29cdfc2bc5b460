//! `pressroom ruleset`: draft/publish lifecycle

use std::path::Path;

use console::style;
use serde::Deserialize;

use crate::types::{IssueSeverity, PressError, Result, Rule, RuleClass};

pub async fn list() -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let rulesets = orchestrator.database().list_rulesets()?;
    if rulesets.is_empty() {
        println!("no rulesets");
        return Ok(());
    }
    println!("{:>4}  {:<10} {:<10} {:>4}  published", "id", "version", "status", "gen");
    for ruleset in rulesets {
        println!(
            "{:>4}  {:<10} {:<10} {:>4}  {}",
            ruleset.id,
            ruleset.version,
            ruleset.status.as_str(),
            ruleset.generation,
            ruleset
                .published_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

/// TOML shape for `ruleset import`
#[derive(Debug, Deserialize)]
struct RulesetFile {
    version: String,
    #[serde(default)]
    rule: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    code: String,
    class: String,
    pattern: String,
    description: String,
    severity: String,
    suggestion: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn import(path: &Path) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PressError::Config(format!("cannot read {}: {e}", path.display())))?;
    let file: RulesetFile = toml::from_str(&raw)
        .map_err(|e| PressError::Config(format!("bad ruleset file {}: {e}", path.display())))?;

    let rules: Vec<Rule> = file
        .rule
        .into_iter()
        .map(|entry| {
            Ok(Rule {
                id: 0,
                ruleset_id: 0,
                code: entry.code,
                class: entry.class.parse::<RuleClass>().map_err(PressError::Config)?,
                pattern: entry.pattern,
                description: entry.description,
                severity: entry
                    .severity
                    .parse::<IssueSeverity>()
                    .map_err(PressError::Config)?,
                suggestion: entry.suggestion,
                enabled: entry.enabled,
            })
        })
        .collect::<Result<_>>()?;

    crate::proofread::validate_rules(&rules)?;
    let draft = orchestrator
        .database()
        .create_ruleset_draft(&file.version, &rules)?;
    println!(
        "{} ruleset {} imported as draft #{} ({} rules)",
        style("ok").green(),
        draft.version,
        draft.id,
        rules.len()
    );
    Ok(())
}

pub async fn publish(id: i64, publisher: &str) -> Result<()> {
    let (_config, orchestrator) = super::bootstrap()?;
    let published = orchestrator.database().publish_ruleset(id, publisher)?;
    println!(
        "{} ruleset {} published as generation {}",
        style("ok").green(),
        published.version,
        published.generation
    );
    Ok(())
}
