// src/core/database.rs
//! SQLite storage: connection, migrations and one repository per table

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::path::Path;

use crate::app_log;
use crate::types::{
    Article, Card, CreateExperienceRequest, CreateJdRequest, ExperienceRecord, FieldValue,
    JdField, JdRecord, NewCard,
};

// ===== Core Database Connection Management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create new database connection with automatic setup
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        app_log!(
            info,
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get pool reference for custom operations
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jd_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                full_job_description TEXT NOT NULL DEFAULT '',
                jd_key_sentences TEXT NOT NULL DEFAULT '',
                keywords_from_sentences TEXT NOT NULL DEFAULT '',
                application_stage TEXT NOT NULL DEFAULT '',
                role_group TEXT NOT NULL DEFAULT '',
                firm_type TEXT NOT NULL DEFAULT '',
                comment TEXT NOT NULL DEFAULT '',
                match_score REAL,
                cv_pdf_url TEXT,
                cv_pdf_filename TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS experience_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                jd_id TEXT,
                company TEXT NOT NULL,
                title TEXT NOT NULL,
                experience TEXT NOT NULL,
                keywords TEXT NOT NULL DEFAULT '[]',
                role_group TEXT,
                work_or_project TEXT,
                time TEXT,
                comment TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                language_pair TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_records (
                id TEXT PRIMARY KEY,
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                selected_text TEXT NOT NULL,
                context_sentence TEXT NOT NULL DEFAULT '',
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                analysis TEXT NOT NULL DEFAULT '',
                analysis_mode TEXT NOT NULL DEFAULT 'simple',
                query_type TEXT NOT NULL DEFAULT 'ai_query',
                user_notes TEXT NOT NULL DEFAULT '',
                ai_notes TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                CHECK (start_offset >= 0 AND start_offset < end_offset)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jd_records_user ON jd_records(user_id);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_experience_records_user ON experience_records(user_id);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analysis_records_article ON analysis_records(article_id);",
        )
        .execute(&self.pool)
        .await?;

        app_log!(info, "Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== JD Repository =====

pub struct JdRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JdRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All records of a user, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<JdRecord>> {
        let records = sqlx::query_as::<_, JdRecord>(
            r#"
            SELECT * FROM jd_records
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn find(&self, id: &str, user_id: &str) -> Result<Option<JdRecord>> {
        let record = sqlx::query_as::<_, JdRecord>(
            "SELECT * FROM jd_records WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Distinct non-empty application stages in use by a user
    pub async fn stage_options(&self, user_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT application_stage FROM jd_records
            WHERE user_id = ? AND application_stage != ''
            ORDER BY application_stage ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("application_stage").map_err(Into::into))
            .collect()
    }

    pub async fn create(&self, request: &CreateJdRequest) -> Result<JdRecord> {
        request.validate()?;

        let record = JdRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            title: request.title.trim().to_string(),
            company: request.company.trim().to_string(),
            full_job_description: request.full_job_description.clone(),
            jd_key_sentences: String::new(),
            keywords_from_sentences: String::new(),
            application_stage: request.application_stage.clone().unwrap_or_default(),
            role_group: request.role_group.clone().unwrap_or_default(),
            firm_type: request.firm_type.clone().unwrap_or_default(),
            comment: request.comment.clone().unwrap_or_default(),
            match_score: request.match_score,
            cv_pdf_url: None,
            cv_pdf_filename: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO jd_records (
                id, user_id, title, company, full_job_description, jd_key_sentences,
                keywords_from_sentences, application_stage, role_group, firm_type,
                comment, match_score, cv_pdf_url, cv_pdf_filename, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.full_job_description)
        .bind(&record.jd_key_sentences)
        .bind(&record.keywords_from_sentences)
        .bind(&record.application_stage)
        .bind(&record.role_group)
        .bind(&record.firm_type)
        .bind(&record.comment)
        .bind(record.match_score)
        .bind(&record.cv_pdf_url)
        .bind(&record.cv_pdf_filename)
        .bind(record.created_at)
        .execute(self.pool)
        .await?;

        app_log!(
            info,
            "Created JD record {} ({} at {})",
            record.id,
            record.title,
            record.company
        );
        Ok(record)
    }

    /// Update a single field; returns the updated record, `None` when not found
    pub async fn update_field(
        &self,
        id: &str,
        user_id: &str,
        field: JdField,
        value: &FieldValue,
    ) -> Result<Option<JdRecord>> {
        // Column names come from the closed JdField set, never from user input.
        let sql = format!(
            "UPDATE jd_records SET {} = ? WHERE id = ? AND user_id = ?",
            field.as_str()
        );

        let query = sqlx::query(&sql);
        let query = match value {
            FieldValue::Text(text) => query.bind(text.clone()),
            FieldValue::Number(number) => query.bind(*number),
            FieldValue::Empty if field.is_nullable() => query.bind(Option::<String>::None),
            FieldValue::Empty => query.bind(String::new()),
        };

        let result = query.bind(id).bind(user_id).execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        app_log!(debug, "Updated JD {} field {}", id, field);
        self.find(id, user_id).await
    }

    /// Store the analysis output on the record
    pub async fn set_analysis(&self, id: &str, key_sentences: &str, keywords: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jd_records
            SET jd_key_sentences = ?, keywords_from_sentences = ?
            WHERE id = ?
            "#,
        )
        .bind(key_sentences)
        .bind(keywords)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jd_records WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            app_log!(info, "Deleted JD record {}", id);
        }
        Ok(deleted)
    }
}

// ===== Experience Repository =====

pub struct ExperienceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ExperienceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<ExperienceRecord> {
        let keywords_json: String = row.try_get("keywords")?;
        let keywords: Vec<String> =
            serde_json::from_str(&keywords_json).context("Invalid keywords column")?;

        Ok(ExperienceRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            jd_id: row.try_get("jd_id")?,
            company: row.try_get("company")?,
            title: row.try_get("title")?,
            experience: row.try_get("experience")?,
            keywords,
            role_group: row.try_get("role_group")?,
            work_or_project: row.try_get("work_or_project")?,
            time: row.try_get("time")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ExperienceRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM experience_records WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    pub async fn find(&self, id: &str) -> Result<Option<ExperienceRecord>> {
        let row = sqlx::query("SELECT * FROM experience_records WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn create(&self, request: &CreateExperienceRequest) -> Result<ExperienceRecord> {
        if request.user_id.trim().is_empty() {
            anyhow::bail!("User ID is required");
        }
        if request.company.trim().is_empty() || request.title.trim().is_empty() {
            anyhow::bail!("Company and title are required");
        }

        let record = ExperienceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            jd_id: request.jd_id.clone(),
            company: request.company.trim().to_string(),
            title: request.title.trim().to_string(),
            experience: request.experience.clone(),
            keywords: request.keywords.clone(),
            role_group: request.role_group.clone(),
            work_or_project: request.work_or_project.clone(),
            time: request.time.clone(),
            comment: request.comment.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO experience_records (
                id, user_id, jd_id, company, title, experience, keywords,
                role_group, work_or_project, time, comment, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.jd_id)
        .bind(&record.company)
        .bind(&record.title)
        .bind(&record.experience)
        .bind(serde_json::to_string(&record.keywords)?)
        .bind(&record.role_group)
        .bind(&record.work_or_project)
        .bind(&record.time)
        .bind(&record.comment)
        .bind(record.created_at)
        .execute(self.pool)
        .await?;

        app_log!(info, "Created experience {} at {}", record.id, record.company);
        Ok(record)
    }
}

// ===== Article Repository =====

pub struct ArticleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ArticleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Article>> {
        let articles =
            sqlx::query_as::<_, Article>("SELECT * FROM articles ORDER BY created_at DESC")
                .fetch_all(self.pool)
                .await?;
        Ok(articles)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(article)
    }

    pub async fn create(&self, title: &str, content: &str, language_pair: &str) -> Result<Article> {
        if content.trim().is_empty() {
            anyhow::bail!("Article content is required");
        }

        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO articles (title, content, language_pair, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(language_pair)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        let article = Article {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            content: content.to_string(),
            language_pair: language_pair.to_string(),
            created_at,
        };

        app_log!(info, "Created article {} ({})", article.id, article.title);
        Ok(article)
    }
}

// ===== Card Repository =====

pub struct CardRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CardRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<Card> {
        let start: i64 = row.try_get("start_offset")?;
        let end: i64 = row.try_get("end_offset")?;

        Ok(Card {
            id: row.try_get("id")?,
            article_id: row.try_get("article_id")?,
            kind: row.try_get::<String, _>("kind")?.parse()?,
            selected_text: row.try_get("selected_text")?,
            context_sentence: row.try_get("context_sentence")?,
            start_offset: usize::try_from(start).context("Negative start offset")?,
            end_offset: usize::try_from(end).context("Negative end offset")?,
            analysis: row.try_get("analysis")?,
            analysis_mode: row.try_get::<String, _>("analysis_mode")?.parse()?,
            query_type: row.try_get::<String, _>("query_type")?.parse()?,
            user_notes: row.try_get("user_notes")?,
            ai_notes: row.try_get("ai_notes")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    /// Cards of an article in reading order
    pub async fn list_for_article(&self, article_id: i64) -> Result<Vec<Card>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM analysis_records
            WHERE article_id = ?
            ORDER BY start_offset ASC, created_at ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    /// Insert a card after checking its range against the article content
    pub async fn create(&self, article: &Article, new_card: &NewCard) -> Result<Card> {
        if new_card.selected_text.trim().is_empty() {
            anyhow::bail!("Selected text is required");
        }
        let range = crate::types::OffsetRange::new(
            new_card.start_offset,
            new_card.end_offset,
            article.char_len(),
        )?;

        let card = Card {
            id: uuid::Uuid::new_v4().to_string(),
            article_id: article.id,
            kind: new_card.kind,
            selected_text: new_card.selected_text.clone(),
            context_sentence: new_card.context_sentence.clone(),
            start_offset: range.start,
            end_offset: range.end,
            analysis: new_card.analysis.clone(),
            analysis_mode: new_card.analysis_mode,
            query_type: new_card.query_type,
            user_notes: new_card.user_notes.clone(),
            ai_notes: new_card.ai_notes.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO analysis_records (
                id, article_id, kind, selected_text, context_sentence, start_offset,
                end_offset, analysis, analysis_mode, query_type, user_notes, ai_notes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&card.id)
        .bind(card.article_id)
        .bind(card.kind.as_str())
        .bind(&card.selected_text)
        .bind(&card.context_sentence)
        .bind(card.start_offset as i64)
        .bind(card.end_offset as i64)
        .bind(&card.analysis)
        .bind(card.analysis_mode.as_str())
        .bind(card.query_type.as_str())
        .bind(&card.user_notes)
        .bind(&card.ai_notes)
        .bind(card.created_at)
        .execute(self.pool)
        .await?;

        app_log!(
            info,
            "Saved {} card {} for article {} [{}..{})",
            card.kind,
            card.id,
            card.article_id,
            card.start_offset,
            card.end_offset
        );
        Ok(card)
    }

    /// Replace user and AI notes; `None` leaves a column unchanged
    pub async fn update_notes(
        &self,
        id: &str,
        user_notes: Option<&str>,
        ai_notes: Option<&str>,
    ) -> Result<Option<Card>> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_records
            SET user_notes = COALESCE(?, user_notes), ai_notes = COALESCE(?, ai_notes)
            WHERE id = ?
            "#,
        )
        .bind(user_notes)
        .bind(ai_notes)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM analysis_records WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn delete(&self, article_id: i64, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analysis_records WHERE id = ? AND article_id = ?")
            .bind(id)
            .bind(article_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisMode, CardKind, QueryType};

    async fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        (dir, db)
    }

    fn jd_request(title: &str) -> CreateJdRequest {
        CreateJdRequest {
            user_id: "user-1".to_string(),
            title: title.to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_jd_field_updates() {
        let (_dir, db) = temp_db().await;
        let repo = JdRepository::new(db.pool());
        let created = repo.create(&jd_request("Backend Engineer")).await.unwrap();

        let updated = repo
            .update_field(
                &created.id,
                "user-1",
                JdField::MatchScore,
                &FieldValue::Number(4.5),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.match_score, Some(4.5));

        let updated = repo
            .update_field(
                &created.id,
                "user-1",
                JdField::ApplicationStage,
                &FieldValue::Text("Applied".to_string()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.application_stage, "Applied");
        assert_eq!(repo.stage_options("user-1").await.unwrap(), vec!["Applied"]);

        let missing = repo
            .update_field("nope", "user-1", JdField::Title, &FieldValue::Text("x".into()))
            .await
            .unwrap();
        assert!(missing.is_none());

        assert!(repo.delete(&created.id, "user-1").await.unwrap());
        assert!(repo.list_for_user("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_card_offsets_round_trip() {
        let (_dir, db) = temp_db().await;
        let article = ArticleRepository::new(db.pool())
            .create("Demo", "Bonjour le monde. Ça va?", "chinese-french")
            .await
            .unwrap();

        let repo = CardRepository::new(db.pool());
        let new_card = NewCard {
            article_id: article.id,
            kind: CardKind::Sentence,
            selected_text: "Ça va".to_string(),
            context_sentence: "Ça va?".to_string(),
            start_offset: 18,
            end_offset: 23,
            analysis: "How are you".to_string(),
            analysis_mode: AnalysisMode::Deep,
            query_type: QueryType::AiQuery,
            user_notes: String::new(),
            ai_notes: String::new(),
        };
        let saved = repo.create(&article, &new_card).await.unwrap();

        let cards = repo.list_for_article(article.id).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, saved.id);
        assert_eq!(cards[0].kind, CardKind::Sentence);
        assert_eq!(cards[0].analysis_mode, AnalysisMode::Deep);
        assert_eq!(cards[0].range().slice(&article.content), Some("Ça va"));

        let out_of_range = NewCard {
            end_offset: 99,
            ..new_card
        };
        assert!(repo.create(&article, &out_of_range).await.is_err());

        let noted = repo
            .update_notes(&saved.id, Some("remember"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(noted.user_notes, "remember");
        assert!(repo.delete(article.id, &saved.id).await.unwrap());
    }
}
