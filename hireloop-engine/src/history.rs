//! SQLite-backed history of attempted jobs and the persisted answer cache.
//!
//! The `history` table is append-only: a unique `(job_id, outcome)` key plus
//! `INSERT OR IGNORE` makes recording idempotent, so a crash between an
//! attempt and its bookkeeping can be replayed safely. Duplicate checks are
//! served from an in-memory index rebuilt from the table when the store opens.
use crate::answers::{AnswerSource, QuestionAnswer};
use crate::posting::SearchFacet;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS history (
        seq          INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id       TEXT NOT NULL,
        outcome      TEXT NOT NULL,
        recorded_at  TEXT NOT NULL,
        term         TEXT,
        date_posted  TEXT,
        sort_by      TEXT,
        pass         INTEGER,
        title        TEXT NOT NULL DEFAULT '',
        company      TEXT NOT NULL DEFAULT '',
        reason       TEXT,
        run_id       TEXT NOT NULL,
        UNIQUE (job_id, outcome)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS question_answer (
        question    TEXT PRIMARY KEY,
        answer      TEXT NOT NULL,
        source      TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )"#,
];

/// Terminal result stored for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Submitted,
    Rejected,
    Failed,
    PausedForReview,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::Submitted,
        Outcome::Rejected,
        Outcome::Failed,
        Outcome::PausedForReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Submitted => "submitted",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
            Outcome::PausedForReview => "paused_for_review",
        }
    }

    /// Lower wins when a job carries several outcomes.
    fn precedence(&self) -> u8 {
        match self {
            Outcome::Submitted => 0,
            Outcome::Rejected => 1,
            Outcome::Failed => 2,
            Outcome::PausedForReview => 3,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Outcome::ALL
            .into_iter()
            .find(|o| o.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown outcome: {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub job_id: String,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
    pub facet: Option<SearchFacet>,
    pub title: String,
    pub company: String,
    pub reason: Option<String>,
    pub run_id: Uuid,
}

/// Read side used by the filter evaluator.
pub trait HistoryLookup {
    /// Dominant recorded outcome for the job, if any.
    fn contains(&self, job_id: &str) -> Option<Outcome>;
}

impl HistoryLookup for HashMap<String, Outcome> {
    fn contains(&self, job_id: &str) -> Option<Outcome> {
        self.get(job_id).copied()
    }
}

pub struct HistoryStore {
    pool: SqlitePool,
    index: HashMap<String, Outcome>,
}

impl HistoryStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory: {}", parent.display())
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open history database: {}", path.display()))?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying the schema and rebuilding the index.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        let rows = sqlx::query("SELECT job_id, outcome FROM history")
            .fetch_all(&pool)
            .await?;
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            let job_id: String = row.try_get("job_id")?;
            let outcome: Outcome = row.try_get::<String, _>("outcome")?.parse()?;
            merge_outcome(&mut index, job_id, outcome);
        }
        info!(jobs = index.len(), "history.index_rebuilt");

        Ok(Self { pool, index })
    }

    /// Append a record. Returns `false` when the `(job_id, outcome)` pair was
    /// already stored.
    pub async fn record(&mut self, record: &HistoryRecord) -> Result<bool> {
        let facet = record.facet.as_ref();
        let res = sqlx::query(
            r#"INSERT OR IGNORE INTO history
               (job_id, outcome, recorded_at, term, date_posted, sort_by, pass,
                title, company, reason, run_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        )
        .bind(record.job_id.as_str())
        .bind(record.outcome.as_str())
        .bind(record.recorded_at.to_rfc3339())
        .bind(facet.map(|f| f.term.clone()))
        .bind(facet.map(|f| f.date_posted.as_str()))
        .bind(facet.map(|f| f.sort_by.as_str()))
        .bind(facet.map(|f| f.pass as i64))
        .bind(record.title.as_str())
        .bind(record.company.as_str())
        .bind(record.reason.as_deref())
        .bind(record.run_id.to_string())
        .execute(&self.pool)
        .await?;

        let inserted = res.rows_affected() > 0;
        merge_outcome(&mut self.index, record.job_id.clone(), record.outcome);
        info!(
            job_id = %record.job_id,
            outcome = %record.outcome,
            inserted,
            "history.record"
        );
        Ok(inserted)
    }

    pub fn contains(&self, job_id: &str) -> Option<Outcome> {
        self.index.get(job_id).copied()
    }

    /// Dominant outcome of every known job.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, Outcome)> + '_ {
        self.index.iter().map(|(id, outcome)| (id.as_str(), *outcome))
    }

    /// Distinct jobs submitted at or after `since`.
    pub async fn submitted_since(&self, since: DateTime<Utc>) -> Result<u32> {
        let row = sqlx::query(
            r#"SELECT COUNT(DISTINCT job_id) AS n FROM history
               WHERE outcome = ?1 AND recorded_at >= ?2"#,
        )
        .bind(Outcome::Submitted.as_str())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    /// Number of distinct jobs with at least one record.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Stored records in insertion order, optionally restricted to one outcome.
    pub async fn records(&self, outcome: Option<Outcome>) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"SELECT job_id, outcome, recorded_at, term, date_posted, sort_by, pass,
                      title, company, reason, run_id
               FROM history
               WHERE (?1 IS NULL OR outcome = ?1)
               ORDER BY seq ASC"#,
        )
        .bind(outcome.map(|o| o.as_str()))
        .fetch_all(&self.pool)
        .await?;
        debug!(rows = rows.len(), outcome = ?outcome, "history.records");

        rows.iter().map(record_from_row).collect()
    }

    pub async fn load_answers(&self) -> Result<Vec<QuestionAnswer>> {
        let rows = sqlx::query("SELECT question, answer, source FROM question_answer")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| -> Result<QuestionAnswer> {
                Ok(QuestionAnswer {
                    question: r.try_get("question")?,
                    answer: r.try_get("answer")?,
                    source: r.try_get::<String, _>("source")?.parse::<AnswerSource>()?,
                })
            })
            .collect()
    }

    pub async fn save_answer(&self, qa: &QuestionAnswer) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO question_answer (question, answer, source, updated_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(question) DO UPDATE SET
                 answer=excluded.answer,
                 source=excluded.source,
                 updated_at=excluded.updated_at"#,
        )
        .bind(qa.question.as_str())
        .bind(qa.answer.as_str())
        .bind(qa.source.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!(question = %qa.question, source = %qa.source, "history.save_answer");
        Ok(())
    }
}

impl HistoryLookup for HistoryStore {
    fn contains(&self, job_id: &str) -> Option<Outcome> {
        HistoryStore::contains(self, job_id)
    }
}

fn merge_outcome(index: &mut HashMap<String, Outcome>, job_id: String, outcome: Outcome) {
    index
        .entry(job_id)
        .and_modify(|current| {
            if outcome.precedence() < current.precedence() {
                *current = outcome;
            }
        })
        .or_insert(outcome);
}

fn record_from_row(r: &SqliteRow) -> Result<HistoryRecord> {
    let recorded_at: String = r.try_get("recorded_at")?;
    let term: Option<String> = r.try_get("term")?;
    let date_posted: Option<String> = r.try_get("date_posted")?;
    let sort_by: Option<String> = r.try_get("sort_by")?;
    let pass: Option<i64> = r.try_get("pass")?;

    let facet = match (term, date_posted, sort_by) {
        (Some(term), Some(date_posted), Some(sort_by)) => Some(SearchFacet {
            term,
            date_posted: date_posted.parse()?,
            sort_by: sort_by.parse()?,
            pass: pass.unwrap_or(1) as u32,
        }),
        _ => None,
    };

    Ok(HistoryRecord {
        job_id: r.try_get("job_id")?,
        outcome: r.try_get::<String, _>("outcome")?.parse()?,
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at)?.with_timezone(&Utc),
        facet,
        title: r.try_get("title")?,
        company: r.try_get("company")?,
        reason: r.try_get("reason")?,
        run_id: r.try_get::<String, _>("run_id")?.parse()?,
    })
}
