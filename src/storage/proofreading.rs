//! Proofreading Persistence
//!
//! Issues are immutable once created; re-analysis supersedes the previous
//! set instead of mutating it. Decisions are append-mostly: a revision
//! marks its predecessor superseded, an orphaned decision is archived,
//! both remain queryable for the feedback loop. Ruleset publication is a
//! single transaction that demotes the previous active set and bumps the
//! generation counter.

use chrono::Utc;
use rusqlite::{Row, Transaction, params};

use super::database::{Database, parse_ts, to_json};
use crate::proofread::{check_publishable, validate_rules};
use crate::types::{
    DecisionKind, IssueSeverity, PressError, ProofreadingDecision, ProofreadingIssue, Result,
    Rule, RuleClass, RuleSet, RulesetStatus,
};

fn map_issue(row: &Row<'_>) -> Result<ProofreadingIssue> {
    let rule_class: String = row.get("rule_class")?;
    let severity: String = row.get("severity")?;
    let created_at: String = row.get("created_at")?;
    Ok(ProofreadingIssue {
        id: row.get("id")?,
        article_id: row.get("article_id")?,
        rule_id: row.get("rule_id")?,
        rule_code: row.get("rule_code")?,
        rule_class: rule_class.parse::<RuleClass>().map_err(PressError::Storage)?,
        severity: severity.parse::<IssueSeverity>().map_err(PressError::Storage)?,
        start_offset: row.get::<_, i64>("start_offset")? as usize,
        end_offset: row.get::<_, i64>("end_offset")? as usize,
        original_text: row.get("original_text")?,
        suggested_text: row.get("suggested_text")?,
        reasoning: row.get("reasoning")?,
        confidence: row.get("confidence")?,
        ruleset_generation: row.get("ruleset_generation")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn map_decision(row: &Row<'_>) -> Result<ProofreadingDecision> {
    let decision: String = row.get("decision")?;
    let decided_at: String = row.get("decided_at")?;
    Ok(ProofreadingDecision {
        id: row.get("id")?,
        article_id: row.get("article_id")?,
        issue_id: row.get("issue_id")?,
        decision: decision.parse::<DecisionKind>().map_err(PressError::Storage)?,
        modified_content: row.get("modified_content")?,
        notes: row.get("notes")?,
        decided_by: row.get("decided_by")?,
        decided_at: parse_ts(&decided_at)?,
        carried: row.get::<_, i64>("carried")? != 0,
        archived: row.get::<_, i64>("archived")? != 0,
        superseded: row.get::<_, i64>("superseded")? != 0,
    })
}

fn map_ruleset(row: &Row<'_>) -> Result<RuleSet> {
    let status: String = row.get("status")?;
    let published_at: Option<String> = row.get("published_at")?;
    let created_at: String = row.get("created_at")?;
    Ok(RuleSet {
        id: row.get("id")?,
        version: row.get("version")?,
        status: status.parse::<RulesetStatus>().map_err(PressError::Storage)?,
        generation: row.get("generation")?,
        published_at: published_at.map(|s| parse_ts(&s)).transpose()?,
        publisher: row.get("publisher")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn map_rule(row: &Row<'_>) -> Result<Rule> {
    let class: String = row.get("class")?;
    let severity: String = row.get("severity")?;
    Ok(Rule {
        id: row.get("id")?,
        ruleset_id: row.get("ruleset_id")?,
        code: row.get("code")?,
        class: class.parse::<RuleClass>().map_err(PressError::Storage)?,
        pattern: row.get("pattern")?,
        description: row.get("description")?,
        severity: severity.parse::<IssueSeverity>().map_err(PressError::Storage)?,
        suggestion: row.get("suggestion")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
    })
}

impl Database {
    // =========================================================================
    // Issues
    // =========================================================================

    /// Persist a fresh analysis: supersede the article's previous issue
    /// set and insert the new one. Returns the stored issues with ids.
    pub fn replace_issue_set(
        &self,
        article_id: i64,
        issues: &[ProofreadingIssue],
    ) -> Result<Vec<ProofreadingIssue>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE proofreading_issues SET superseded = 1
             WHERE article_id = ?1 AND superseded = 0",
            params![article_id],
        )?;

        let now = Utc::now().to_rfc3339();
        for issue in issues {
            tx.execute(
                "INSERT INTO proofreading_issues
                     (article_id, rule_id, rule_code, rule_class, severity,
                      start_offset, end_offset, original_text, suggested_text,
                      reasoning, confidence, ruleset_generation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    article_id,
                    issue.rule_id,
                    issue.rule_code,
                    issue.rule_class.as_str(),
                    issue.severity.as_str(),
                    issue.start_offset as i64,
                    issue.end_offset as i64,
                    issue.original_text,
                    issue.suggested_text,
                    issue.reasoning,
                    issue.confidence,
                    issue.ruleset_generation,
                    now,
                ],
            )?;
        }

        append_history_tx(
            &tx,
            article_id,
            issues.first().map(|i| i.ruleset_generation).unwrap_or(0),
            "analysis",
            &serde_json::json!({"issues": issues.len()}),
        )?;

        tx.commit()?;
        drop(conn);

        self.list_issues(article_id, false)
    }

    /// The article's current (or full) issue set, in offset order
    pub fn list_issues(
        &self,
        article_id: i64,
        include_superseded: bool,
    ) -> Result<Vec<ProofreadingIssue>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, article_id, rule_id, rule_code, rule_class, severity,
                    start_offset, end_offset, original_text, suggested_text,
                    reasoning, confidence, ruleset_generation, created_at
             FROM proofreading_issues
             WHERE article_id = ?1 AND (superseded = 0 OR ?2)
             ORDER BY start_offset, severity",
        )?;
        let mut rows = stmt.query(params![article_id, include_superseded as i64])?;
        let mut issues = Vec::new();
        while let Some(row) = rows.next()? {
            issues.push(map_issue(row)?);
        }
        crate::types::sort_issues(&mut issues);
        Ok(issues)
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    /// Submit an operator decision on an issue.
    ///
    /// At most one active decision per issue: when one exists and
    /// `supersede` is false the submission is rejected with `StaleState`
    /// (the operator re-reads and may re-submit as a supersede). With
    /// `supersede = true` the previous decision is retained but marked.
    pub fn submit_decision(
        &self,
        article_id: i64,
        issue_id: i64,
        decision: DecisionKind,
        modified_content: Option<String>,
        notes: Option<String>,
        operator: &str,
        supersede: bool,
    ) -> Result<ProofreadingDecision> {
        if decision == DecisionKind::Modified
            && modified_content.as_deref().is_none_or(str::is_empty)
        {
            return Err(PressError::Config(
                "modified decision requires modified_content".to_string(),
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let issue_exists: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM proofreading_issues
                 WHERE id = ?1 AND article_id = ?2 AND superseded = 0",
                params![issue_id, article_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if !issue_exists {
            return Err(PressError::NotFound(format!(
                "issue {issue_id} on article {article_id}"
            )));
        }

        // Accepting requires a suggestion to accept
        if decision == DecisionKind::Accepted {
            let has_suggestion: bool = tx
                .query_row(
                    "SELECT suggested_text IS NOT NULL FROM proofreading_issues WHERE id = ?1",
                    params![issue_id],
                    |row| row.get(0),
                )?;
            if !has_suggestion {
                return Err(PressError::Config(format!(
                    "issue {issue_id} has no suggested_text to accept"
                )));
            }
        }

        let active_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM proofreading_decisions
             WHERE issue_id = ?1 AND archived = 0 AND superseded = 0",
            params![issue_id],
            |row| row.get(0),
        )?;

        if active_count > 0 {
            if !supersede {
                return Err(PressError::StaleState(format!(
                    "issue {issue_id} already has an active decision"
                )));
            }
            tx.execute(
                "UPDATE proofreading_decisions SET superseded = 1
                 WHERE issue_id = ?1 AND archived = 0 AND superseded = 0",
                params![issue_id],
            )?;
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO proofreading_decisions
                 (article_id, issue_id, decision, modified_content, notes,
                  decided_by, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                article_id,
                issue_id,
                decision.as_str(),
                modified_content,
                notes,
                operator,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        drop(conn);

        self.get_decision(id)
    }

    pub fn get_decision(&self, id: i64) -> Result<ProofreadingDecision> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, article_id, issue_id, decision, modified_content, notes,
                    decided_by, decided_at, carried, archived, superseded
             FROM proofreading_decisions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => map_decision(row),
            None => Err(PressError::NotFound(format!("decision {id}"))),
        }
    }

    /// An article's decisions; active only by default
    pub fn list_decisions(
        &self,
        article_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<ProofreadingDecision>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, article_id, issue_id, decision, modified_content, notes,
                    decided_by, decided_at, carried, archived, superseded
             FROM proofreading_decisions
             WHERE article_id = ?1 AND ((archived = 0 AND superseded = 0) OR ?2)
             ORDER BY decided_at",
        )?;
        let mut rows = stmt.query(params![article_id, include_inactive as i64])?;
        let mut decisions = Vec::new();
        while let Some(row) = rows.next()? {
            decisions.push(map_decision(row)?);
        }
        Ok(decisions)
    }

    /// Archive decisions orphaned by a re-analysis
    pub fn archive_decisions(&self, decision_ids: &[i64]) -> Result<()> {
        let conn = self.conn()?;
        for id in decision_ids {
            conn.execute(
                "UPDATE proofreading_decisions SET archived = 1 WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(())
    }

    /// Re-point carried decisions at their new issues with the audit flag
    pub fn carry_decisions(&self, pairs: &[(i64, i64)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (decision_id, new_issue_id) in pairs {
            tx.execute(
                "UPDATE proofreading_decisions SET issue_id = ?1, carried = 1 WHERE id = ?2",
                params![new_issue_id, decision_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // =========================================================================
    // Rulesets
    // =========================================================================

    /// Create a draft ruleset with its rules
    pub fn create_ruleset_draft(&self, version: &str, rules: &[Rule]) -> Result<RuleSet> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO rulesets (version, status, generation, created_at)
             VALUES (?1, 'draft', 0, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )?;
        let ruleset_id = tx.last_insert_rowid();
        for rule in rules {
            tx.execute(
                "INSERT INTO rules (ruleset_id, code, class, pattern, description,
                                    severity, suggestion, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    ruleset_id,
                    rule.code,
                    rule.class.as_str(),
                    rule.pattern,
                    rule.description,
                    rule.severity.as_str(),
                    rule.suggestion,
                    rule.enabled as i64
                ],
            )?;
        }
        tx.commit()?;
        drop(conn);
        self.get_ruleset(ruleset_id)
    }

    pub fn get_ruleset(&self, id: i64) -> Result<RuleSet> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, version, status, generation, published_at, publisher, created_at
             FROM rulesets WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => map_ruleset(row),
            None => Err(PressError::NotFound(format!("ruleset {id}"))),
        }
    }

    pub fn list_rulesets(&self) -> Result<Vec<RuleSet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, version, status, generation, published_at, publisher, created_at
             FROM rulesets ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        let mut rulesets = Vec::new();
        while let Some(row) = rows.next()? {
            rulesets.push(map_ruleset(row)?);
        }
        Ok(rulesets)
    }

    pub fn get_ruleset_rules(&self, ruleset_id: i64) -> Result<Vec<Rule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, ruleset_id, code, class, pattern, description, severity,
                    suggestion, enabled
             FROM rules WHERE ruleset_id = ?1 ORDER BY code",
        )?;
        let mut rows = stmt.query(params![ruleset_id])?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            rules.push(map_rule(row)?);
        }
        Ok(rules)
    }

    /// The currently published ruleset with its rules, if any
    pub fn active_ruleset(&self) -> Result<Option<(RuleSet, Vec<Rule>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, version, status, generation, published_at, publisher, created_at
             FROM rulesets WHERE status = 'published' ORDER BY generation DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let ruleset = map_ruleset(row)?;
        drop(rows);
        drop(stmt);
        drop(conn);
        let rules = self.get_ruleset_rules(ruleset.id)?;
        Ok(Some((ruleset, rules)))
    }

    /// Publish a draft ruleset: validate, demote the previous active set
    /// to archived, bump the generation counter. One transaction; the
    /// exactly-one-active invariant holds outside it.
    pub fn publish_ruleset(&self, ruleset_id: i64, publisher: &str) -> Result<RuleSet> {
        let ruleset = self.get_ruleset(ruleset_id)?;
        check_publishable(&ruleset)?;
        let rules = self.get_ruleset_rules(ruleset_id)?;
        validate_rules(&rules)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let next_generation: u32 = tx.query_row(
            "SELECT COALESCE(MAX(generation), 0) + 1 FROM rulesets",
            [],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE rulesets SET status = 'archived' WHERE status = 'published'",
            [],
        )?;
        tx.execute(
            "UPDATE rulesets SET status = 'published', generation = ?1,
                 published_at = ?2, publisher = ?3
             WHERE id = ?4",
            params![
                next_generation,
                Utc::now().to_rfc3339(),
                publisher,
                ruleset_id
            ],
        )?;

        tx.commit()?;
        drop(conn);

        self.get_ruleset(ruleset_id)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Append to the analysis ledger
    pub fn append_history(
        &self,
        article_id: i64,
        generation: u32,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO proofreading_history
                 (article_id, ruleset_generation, event, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                article_id,
                generation,
                event,
                to_json(payload)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

fn append_history_tx(
    tx: &Transaction<'_>,
    article_id: i64,
    generation: u32,
    event: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    tx.execute(
        "INSERT INTO proofreading_history
             (article_id, ruleset_generation, event, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            article_id,
            generation,
            event,
            to_json(payload)?,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn issue(start: usize, rule_code: &str, generation: u32) -> ProofreadingIssue {
        ProofreadingIssue {
            id: 0,
            article_id: 1,
            rule_id: 1,
            rule_code: rule_code.into(),
            rule_class: RuleClass::B,
            severity: IssueSeverity::Error,
            start_offset: start,
            end_offset: start + 3,
            original_text: "teh".into(),
            suggested_text: Some("the".into()),
            reasoning: None,
            confidence: 0.95,
            ruleset_generation: generation,
            created_at: Utc::now(),
        }
    }

    fn rule(code: &str, pattern: &str) -> Rule {
        Rule {
            id: 0,
            ruleset_id: 0,
            code: code.into(),
            class: RuleClass::B,
            pattern: pattern.into(),
            description: "test rule".into(),
            severity: IssueSeverity::Error,
            suggestion: Some("the".into()),
            enabled: true,
        }
    }

    #[test]
    fn test_issue_set_replace_supersedes() {
        let db = Database::open_in_memory().unwrap();
        let first = db.replace_issue_set(1, &[issue(5, "B01", 1)]).unwrap();
        assert_eq!(first.len(), 1);

        let second = db
            .replace_issue_set(1, &[issue(5, "B01", 2), issue(12, "B01", 2)])
            .unwrap();
        assert_eq!(second.len(), 2);

        let all = db.list_issues(1, true).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_decision_submit_and_conflict() {
        let db = Database::open_in_memory().unwrap();
        let issues = db.replace_issue_set(1, &[issue(5, "B01", 1)]).unwrap();
        let issue_id = issues[0].id;

        // Operator A decides first
        let a = db
            .submit_decision(1, issue_id, DecisionKind::Accepted, None, None, "alice", false)
            .unwrap();
        assert_eq!(a.decided_by, "alice");

        // Operator B loses the race
        let err = db
            .submit_decision(1, issue_id, DecisionKind::Rejected, None, None, "bob", false)
            .unwrap_err();
        assert!(matches!(err, PressError::StaleState(_)));

        // B re-reads and supersedes deliberately
        let b = db
            .submit_decision(1, issue_id, DecisionKind::Rejected, None, None, "bob", true)
            .unwrap();
        assert_eq!(b.decided_by, "bob");

        // Exactly one active decision; history keeps both
        let active = db.list_decisions(1, false).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].decided_by, "bob");
        assert_eq!(db.list_decisions(1, true).unwrap().len(), 2);
    }

    #[test]
    fn test_modified_requires_content() {
        let db = Database::open_in_memory().unwrap();
        let issues = db.replace_issue_set(1, &[issue(5, "B01", 1)]).unwrap();
        let err = db
            .submit_decision(
                1,
                issues[0].id,
                DecisionKind::Modified,
                None,
                None,
                "alice",
                false,
            )
            .unwrap_err();
        assert!(matches!(err, PressError::Config(_)));
    }

    #[test]
    fn test_accept_requires_suggestion() {
        let db = Database::open_in_memory().unwrap();
        let mut no_suggestion = issue(5, "A01", 1);
        no_suggestion.suggested_text = None;
        let issues = db.replace_issue_set(1, &[no_suggestion]).unwrap();
        let err = db
            .submit_decision(
                1,
                issues[0].id,
                DecisionKind::Accepted,
                None,
                None,
                "alice",
                false,
            )
            .unwrap_err();
        assert!(matches!(err, PressError::Config(_)));
    }

    #[test]
    fn test_decision_on_superseded_issue_rejected() {
        let db = Database::open_in_memory().unwrap();
        let old = db.replace_issue_set(1, &[issue(5, "B01", 1)]).unwrap();
        db.replace_issue_set(1, &[issue(9, "B01", 2)]).unwrap();

        let err = db
            .submit_decision(1, old[0].id, DecisionKind::Accepted, None, None, "alice", false)
            .unwrap_err();
        assert!(matches!(err, PressError::NotFound(_)));
    }

    #[test]
    fn test_carry_and_archive() {
        let db = Database::open_in_memory().unwrap();
        let old = db.replace_issue_set(1, &[issue(5, "B01", 1)]).unwrap();
        let decision = db
            .submit_decision(1, old[0].id, DecisionKind::Accepted, None, None, "alice", false)
            .unwrap();

        let new = db.replace_issue_set(1, &[issue(8, "B01", 2)]).unwrap();
        db.carry_decisions(&[(decision.id, new[0].id)]).unwrap();

        let carried = db.get_decision(decision.id).unwrap();
        assert!(carried.carried);
        assert_eq!(carried.issue_id, new[0].id);

        db.archive_decisions(&[decision.id]).unwrap();
        assert!(db.get_decision(decision.id).unwrap().archived);
    }

    #[test]
    fn test_ruleset_publish_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let v1 = db
            .create_ruleset_draft("v1", &[rule("B01", r"\bteh\b")])
            .unwrap();
        assert_eq!(v1.status, RulesetStatus::Draft);
        assert!(db.active_ruleset().unwrap().is_none());

        let published = db.publish_ruleset(v1.id, "admin").unwrap();
        assert_eq!(published.status, RulesetStatus::Published);
        assert_eq!(published.generation, 1);
        assert_eq!(published.publisher.as_deref(), Some("admin"));

        // Publish v2: v1 demoted, generation bumped
        let v2 = db
            .create_ruleset_draft("v2", &[rule("B01", r"\bteh\b"), rule("B02", r"\brecieve\b")])
            .unwrap();
        let published2 = db.publish_ruleset(v2.id, "admin").unwrap();
        assert_eq!(published2.generation, 2);

        let all = db.list_rulesets().unwrap();
        assert!(crate::proofread::exactly_one_active(&all));
        assert_eq!(
            db.get_ruleset(v1.id).unwrap().status,
            RulesetStatus::Archived
        );

        let (active, rules) = db.active_ruleset().unwrap().unwrap();
        assert_eq!(active.id, v2.id);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_publish_invalid_ruleset_rejected() {
        let db = Database::open_in_memory().unwrap();
        let draft = db
            .create_ruleset_draft("bad", &[rule("B01", r"([unclosed")])
            .unwrap();
        assert!(db.publish_ruleset(draft.id, "admin").is_err());
        // Still a draft, nothing demoted
        assert_eq!(db.get_ruleset(draft.id).unwrap().status, RulesetStatus::Draft);
    }

    #[test]
    fn test_publish_published_ruleset_rejected() {
        let db = Database::open_in_memory().unwrap();
        let draft = db
            .create_ruleset_draft("v1", &[rule("B01", r"x")])
            .unwrap();
        db.publish_ruleset(draft.id, "admin").unwrap();
        let err = db.publish_ruleset(draft.id, "admin").unwrap_err();
        assert!(matches!(err, PressError::InvalidTransition { .. }));
    }

    #[test]
    fn test_duplicate_code_rejected_at_insert() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_ruleset_draft("v1", &[rule("B01", "x"), rule("B01", "y")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_appends() {
        let db = Database::open_in_memory().unwrap();
        db.append_history(1, 3, "finalize", &serde_json::json!({"applied": 4}))
            .unwrap();
        db.replace_issue_set(1, &[issue(5, "B01", 3)]).unwrap();

        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM proofreading_history WHERE article_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
