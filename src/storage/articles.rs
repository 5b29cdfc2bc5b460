//! Article and Image Persistence
//!
//! Articles are created when parsing succeeds and updated in place on
//! re-parse (the previous suggestion set is superseded). Images are
//! replaced wholesale with each parse; review decisions attach to the
//! surviving rows.

use chrono::Utc;
use rusqlite::{Row, params};

use super::database::{Database, from_json, parse_ts, parse_ts_opt, to_json};
use crate::optimizer::OptimizationResult;
use crate::parser::ParsedArticle;
use crate::types::{
    Article, ArticleImage, ArticleStatus, ImageReview, ImageSpecs, ParsingMethod, PressError,
    Result, TitleParts,
};

const ARTICLE_COLUMNS: &str = "id, worklist_item_id, title_prefix, title_main, title_suffix, \
     author_name, body_html, body_text, meta_description, seo_keywords, tags, categories, \
     suggested_title_sets, suggested_meta_description, suggested_seo_keywords, faq_proposals, \
     parsing_method, parsing_confidence, parsing_confirmed, parsing_confirmed_by, \
     parsing_confirmed_at, status, cms_article_id, published_url, published_at, \
     ai_model_used, generation_cost, created_at, updated_at";

fn map_article(row: &Row<'_>) -> Result<Article> {
    let parsing_method: String = row.get("parsing_method")?;
    let status: String = row.get("status")?;
    let seo_keywords: String = row.get("seo_keywords")?;
    let tags: String = row.get("tags")?;
    let categories: String = row.get("categories")?;
    let title_sets: String = row.get("suggested_title_sets")?;
    let keyword_tiers: Option<String> = row.get("suggested_seo_keywords")?;
    let faqs: String = row.get("faq_proposals")?;
    let confirmed_at: Option<String> = row.get("parsing_confirmed_at")?;
    let published_at: Option<String> = row.get("published_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Article {
        id: row.get("id")?,
        worklist_item_id: row.get("worklist_item_id")?,
        title: TitleParts {
            prefix: row.get("title_prefix")?,
            main: row.get("title_main")?,
            suffix: row.get("title_suffix")?,
        },
        author_name: row.get("author_name")?,
        body_html: row.get("body_html")?,
        body_text: row.get("body_text")?,
        meta_description: row.get("meta_description")?,
        seo_keywords: from_json(&seo_keywords, "articles.seo_keywords")?,
        tags: from_json(&tags, "articles.tags")?,
        categories: from_json(&categories, "articles.categories")?,
        suggested_title_sets: from_json(&title_sets, "articles.suggested_title_sets")?,
        suggested_meta_description: row.get("suggested_meta_description")?,
        suggested_seo_keywords: keyword_tiers
            .map(|raw| from_json(&raw, "articles.suggested_seo_keywords"))
            .transpose()?,
        faq_proposals: from_json(&faqs, "articles.faq_proposals")?,
        parsing_method: parsing_method
            .parse::<ParsingMethod>()
            .map_err(PressError::Storage)?,
        parsing_confidence: row.get("parsing_confidence")?,
        parsing_confirmed: row.get::<_, i64>("parsing_confirmed")? != 0,
        parsing_confirmed_by: row.get("parsing_confirmed_by")?,
        parsing_confirmed_at: parse_ts_opt(confirmed_at)?,
        status: status.parse::<ArticleStatus>().map_err(PressError::Storage)?,
        cms_article_id: row.get("cms_article_id")?,
        published_url: row.get("published_url")?,
        published_at: parse_ts_opt(published_at)?,
        ai_model_used: row.get("ai_model_used")?,
        generation_cost_usd: row.get("generation_cost")?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

impl Database {
    /// Create an article from a successful parse
    pub fn create_article(
        &self,
        worklist_item_id: i64,
        parsed: &ParsedArticle,
        method: ParsingMethod,
        confidence: f32,
    ) -> Result<Article> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO articles
                 (worklist_item_id, title_prefix, title_main, title_suffix, author_name,
                  body_html, body_text, meta_description, seo_keywords, tags,
                  parsing_method, parsing_confidence, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'draft', ?13, ?13)",
            params![
                worklist_item_id,
                parsed.title.prefix,
                parsed.title.main,
                parsed.title.suffix,
                parsed.author_name,
                parsed.body_html,
                parsed.body_text,
                parsed.meta_description,
                to_json(&parsed.seo_keywords)?,
                to_json(&parsed.tags)?,
                method.as_str(),
                confidence,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.replace_article_images(id, parsed)?;
        self.get_article(id)
    }

    /// Re-parse: update the article in place and supersede the previous
    /// suggestion set
    pub fn update_article_from_parse(
        &self,
        article_id: i64,
        parsed: &ParsedArticle,
        method: ParsingMethod,
        confidence: f32,
    ) -> Result<Article> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE articles SET
                 title_prefix = ?1, title_main = ?2, title_suffix = ?3, author_name = ?4,
                 body_html = ?5, body_text = ?6, meta_description = ?7,
                 seo_keywords = ?8, tags = ?9,
                 parsing_method = ?10, parsing_confidence = ?11,
                 parsing_confirmed = 0, parsing_confirmed_by = NULL,
                 parsing_confirmed_at = NULL,
                 suggested_title_sets = '[]', suggested_meta_description = NULL,
                 suggested_seo_keywords = NULL, faq_proposals = '[]',
                 updated_at = ?12
             WHERE id = ?13",
            params![
                parsed.title.prefix,
                parsed.title.main,
                parsed.title.suffix,
                parsed.author_name,
                parsed.body_html,
                parsed.body_text,
                parsed.meta_description,
                to_json(&parsed.seo_keywords)?,
                to_json(&parsed.tags)?,
                method.as_str(),
                confidence,
                Utc::now().to_rfc3339(),
                article_id,
            ],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article {article_id}")));
        }
        drop(conn);

        self.replace_article_images(article_id, parsed)?;
        self.get_article(article_id)
    }

    pub fn get_article(&self, id: i64) -> Result<Article> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => map_article(row),
            None => Err(PressError::NotFound(format!("article {id}"))),
        }
    }

    /// Store an optimization result on the article's suggestion fields.
    /// Spend is booked separately through [`Database::add_generation_cost`]
    /// so re-applying a cached result never double-counts.
    pub fn apply_optimizations(&self, article_id: i64, result: &OptimizationResult) -> Result<()> {
        let tiers = crate::types::KeywordTiers {
            focus: result.seo_suggestions.keywords.focus.clone(),
            primary: result.seo_suggestions.keywords.primary.clone(),
            secondary: result.seo_suggestions.keywords.secondary.clone(),
        };
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE articles SET
                 suggested_title_sets = ?1,
                 suggested_meta_description = ?2,
                 suggested_seo_keywords = ?3,
                 faq_proposals = ?4,
                 ai_model_used = ?5,
                 updated_at = ?6
             WHERE id = ?7",
            params![
                to_json(&result.title_suggestions)?,
                result.seo_suggestions.meta_description,
                to_json(&tiers)?,
                to_json(&result.faqs)?,
                result.generation_metadata.model,
                Utc::now().to_rfc3339(),
                article_id,
            ],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article {article_id}")));
        }
        Ok(())
    }

    /// Book AI spend that produced no stored output (aborted calls)
    pub fn add_generation_cost(&self, article_id: i64, cost_usd: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE articles SET generation_cost = generation_cost + ?1, updated_at = ?2
             WHERE id = ?3",
            params![cost_usd, Utc::now().to_rfc3339(), article_id],
        )?;
        Ok(())
    }

    /// Operator confirms the parse in parsing_review
    pub fn confirm_parsing(&self, article_id: i64, operator: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE articles SET parsing_confirmed = 1, parsing_confirmed_by = ?1,
                 parsing_confirmed_at = ?2, updated_at = ?2
             WHERE id = ?3",
            params![operator, Utc::now().to_rfc3339(), article_id],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article {article_id}")));
        }
        Ok(())
    }

    /// Persist the finalized body after proofreading review
    pub fn finalize_body(&self, article_id: i64, body_html: &str, body_text: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE articles SET body_html = ?1, body_text = ?2, status = 'ready_to_publish',
                 updated_at = ?3
             WHERE id = ?4",
            params![body_html, body_text, Utc::now().to_rfc3339(), article_id],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article {article_id}")));
        }
        Ok(())
    }

    /// Update the workflow-scoped article status
    pub fn set_article_status(&self, article_id: i64, status: ArticleStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE articles SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), article_id],
        )?;
        Ok(())
    }

    /// Record the CMS draft created by a completed publish task
    pub fn record_publication(
        &self,
        article_id: i64,
        cms_article_id: &str,
        published_url: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE articles SET cms_article_id = ?1, published_url = ?2, published_at = ?3,
                 status = 'published', updated_at = ?3
             WHERE id = ?4",
            params![
                cms_article_id,
                published_url,
                Utc::now().to_rfc3339(),
                article_id
            ],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article {article_id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Replace the article's image set from a parse
    pub fn replace_article_images(&self, article_id: i64, parsed: &ParsedArticle) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM article_images WHERE article_id = ?1",
            params![article_id],
        )?;
        for image in &parsed.images {
            let specs = ImageSpecs {
                width: image.width,
                height: image.height,
                file_size_bytes: None,
                format: None,
            };
            tx.execute(
                "INSERT INTO article_images (article_id, position, source_url, caption, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    article_id,
                    image.position,
                    image.source_url,
                    image.caption,
                    to_json(&specs)?
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// List an article's images ordered by position
    pub fn list_article_images(&self, article_id: i64) -> Result<Vec<ArticleImage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, article_id, position, source_url, preview_path, source_path,
                    caption, metadata, review
             FROM article_images WHERE article_id = ?1 ORDER BY position",
        )?;
        let mut rows = stmt.query(params![article_id])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            let metadata: String = row.get("metadata")?;
            let review: Option<String> = row.get("review")?;
            images.push(ArticleImage {
                id: row.get("id")?,
                article_id: row.get("article_id")?,
                position: row.get("position")?,
                source_url: row.get("source_url")?,
                preview_path: row.get("preview_path")?,
                source_path: row.get("source_path")?,
                caption: row.get("caption")?,
                specs: from_json(&metadata, "article_images.metadata")?,
                review: review
                    .map(|raw| from_json(&raw, "article_images.review"))
                    .transpose()?,
            });
        }
        Ok(images)
    }

    /// Attach the zero-or-one review decision to an image
    pub fn set_image_review(&self, image_id: i64, review: &ImageReview) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE article_images SET review = ?1 WHERE id = ?2",
            params![to_json(review)?, image_id],
        )?;
        if changed == 0 {
            return Err(PressError::NotFound(format!("article image {image_id}")));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParsedArticle, ParsedImage};
    use crate::types::ImageReviewAction;

    pub(crate) fn parsed_article() -> ParsedArticle {
        ParsedArticle {
            title: TitleParts::main_only("Configure X"),
            author_line: None,
            author_name: Some("Jane".into()),
            body_html: "<p>body text of the article</p>".into(),
            body_text: "body text of the article".into(),
            offsets: Default::default(),
            meta_description: Some("summary".into()),
            seo_keywords: vec!["x".into(), "config".into()],
            tags: vec![],
            images: vec![
                ParsedImage {
                    position: 0,
                    source_url: "https://img/a.png".into(),
                    caption: Some("one".into()),
                    width: Some(640),
                    height: None,
                },
                ParsedImage {
                    position: 2,
                    source_url: "https://img/b.png".into(),
                    caption: None,
                    width: None,
                    height: None,
                },
            ],
        }
    }

    #[test]
    fn test_create_and_get_article() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Heuristic, 0.70)
            .unwrap();
        assert_eq!(article.title.main, "Configure X");
        assert_eq!(article.parsing_method, ParsingMethod::Heuristic);
        assert_eq!(article.parsing_confidence, 0.70);
        assert_eq!(article.status, ArticleStatus::Draft);
        assert!(!article.parsing_confirmed);
        assert_eq!(article.generation_cost_usd, 0.0);
    }

    #[test]
    fn test_images_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        let images = db.list_article_images(article.id).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].position, 0);
        assert_eq!(images[0].specs.width, Some(640));
        assert_eq!(images[1].position, 2);
        assert!(crate::types::positions_strictly_increasing(&images));
    }

    #[test]
    fn test_reparse_updates_in_place_and_supersedes_suggestions() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        db.confirm_parsing(article.id, "alice").unwrap();

        let mut reparsed = parsed_article();
        reparsed.title = TitleParts::main_only("Configure X, Better");
        reparsed.images.pop();
        let updated = db
            .update_article_from_parse(article.id, &reparsed, ParsingMethod::Heuristic, 0.70)
            .unwrap();

        assert_eq!(updated.id, article.id);
        assert_eq!(updated.title.main, "Configure X, Better");
        assert_eq!(updated.parsing_method, ParsingMethod::Heuristic);
        // Confirmation and suggestions reset
        assert!(!updated.parsing_confirmed);
        assert!(updated.suggested_title_sets.is_empty());
        assert_eq!(db.list_article_images(article.id).unwrap().len(), 1);
    }

    #[test]
    fn test_confirm_parsing_sets_audit() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        db.confirm_parsing(article.id, "alice").unwrap();

        let loaded = db.get_article(article.id).unwrap();
        assert!(loaded.parsing_confirmed);
        assert_eq!(loaded.parsing_confirmed_by.as_deref(), Some("alice"));
        assert!(loaded.parsing_confirmed_at.is_some());
        assert!(loaded.confirmation_ok());
    }

    #[test]
    fn test_record_publication() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        db.record_publication(article.id, "12345", "https://cms/draft/12345")
            .unwrap();

        let loaded = db.get_article(article.id).unwrap();
        assert_eq!(loaded.status, ArticleStatus::Published);
        assert_eq!(loaded.cms_article_id.as_deref(), Some("12345"));
        assert!(loaded.published_at.is_some());
    }

    #[test]
    fn test_generation_cost_accumulates() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        db.add_generation_cost(article.id, 0.06).unwrap();
        db.add_generation_cost(article.id, 0.04).unwrap();
        let loaded = db.get_article(article.id).unwrap();
        assert!((loaded.generation_cost_usd - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_image_review_attach() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        let images = db.list_article_images(article.id).unwrap();
        db.set_image_review(
            images[0].id,
            &ImageReview {
                action: ImageReviewAction::ReplaceCaption {
                    new_value: "better caption".into(),
                },
                notes: None,
            },
        )
        .unwrap();

        let reloaded = db.list_article_images(article.id).unwrap();
        assert!(reloaded[0].review.is_some());
        assert!(reloaded[1].review.is_none());
    }

    #[test]
    fn test_finalize_body() {
        let db = Database::open_in_memory().unwrap();
        let article = db
            .create_article(1, &parsed_article(), ParsingMethod::Ai, 0.95)
            .unwrap();
        db.finalize_body(article.id, "<p>corrected</p>", "corrected")
            .unwrap();
        let loaded = db.get_article(article.id).unwrap();
        assert_eq!(loaded.body_html, "<p>corrected</p>");
        assert_eq!(loaded.status, ArticleStatus::ReadyToPublish);
    }
}
