//! Remote interview records and dashboard aggregation.
//!
//! Records are insert-only and always read through the owning user's id.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::interview::models::{Answer, InterviewReport, Question};
use crate::interview::session::{InterviewSession, Phase};
use crate::models::interview::InterviewRecordRow;

/// The `script` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewScript {
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub feedback: InterviewReport,
}

#[derive(Debug, Clone)]
pub struct NewInterviewRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: &'static str,
    pub difficulty: &'static str,
    pub marks: i32,
    pub script: InterviewScript,
    pub interview_date: NaiveDate,
    pub interview_time: NaiveTime,
}

impl NewInterviewRecord {
    /// Only complete sessions with a report produce a record.
    pub fn from_session(session: &InterviewSession, now: DateTime<Utc>) -> Option<Self> {
        if session.phase != Phase::Complete {
            return None;
        }
        let report = session.report.clone()?;
        Some(Self {
            id: session.id,
            user_id: session.user_id,
            category: session.setup.category.as_str(),
            difficulty: session.setup.difficulty.as_str(),
            marks: report.score as i32,
            script: InterviewScript {
                questions: session.questions.clone(),
                answers: session.answers.clone(),
                feedback: report,
            },
            interview_date: now.date_naive(),
            interview_time: now.time(),
        })
    }
}

/// Storage for saved interviews, carried in `AppState` as `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent by record id. Returns whether a new row was written.
    async fn insert(&self, record: &NewInterviewRecord) -> Result<bool>;

    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<InterviewRecordRow>>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<InterviewRecordRow>>;
}

/// Records in the `interview_records` table.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &NewInterviewRecord) -> Result<bool> {
        insert_interview_record(&self.pool, record).await
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<InterviewRecordRow>> {
        list_user_interviews(&self.pool, user_id).await
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<InterviewRecordRow>> {
        get_user_interview(&self.pool, user_id, id).await
    }
}

/// Inserts the record. Re-inserting the same session is a no-op, which makes
/// retries safe. Returns whether a new row was written.
pub async fn insert_interview_record(pool: &PgPool, record: &NewInterviewRecord) -> Result<bool> {
    let script = serde_json::to_value(&record.script)?;
    let result = sqlx::query(
        r#"
        INSERT INTO interview_records
            (id, user_id, category, difficulty, marks, script, interview_date, interview_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(record.category)
    .bind(record.difficulty)
    .bind(record.marks)
    .bind(script)
    .bind(record.interview_date)
    .bind(record.interview_time)
    .execute(pool)
    .await?;

    let inserted = result.rows_affected() == 1;
    if inserted {
        info!(
            "Saved interview record {} for user {}",
            record.id, record.user_id
        );
    }
    Ok(inserted)
}

/// Newest first.
pub async fn list_user_interviews(pool: &PgPool, user_id: Uuid) -> Result<Vec<InterviewRecordRow>> {
    Ok(sqlx::query_as::<_, InterviewRecordRow>(
        "SELECT * FROM interview_records WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_user_interview(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<InterviewRecordRow>> {
    Ok(sqlx::query_as::<_, InterviewRecordRow>(
        "SELECT * FROM interview_records WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_interviews: usize,
    pub average_score: Option<f64>,
    pub best_score: Option<i32>,
    pub latest_score: Option<i32>,
    pub by_category: Vec<CategoryStats>,
}

/// Aggregates rows that are already ordered newest first.
pub fn summarize(rows: &[InterviewRecordRow]) -> DashboardStats {
    let total = rows.len();
    let sum: i64 = rows.iter().map(|r| r.marks as i64).sum();

    let mut per_category: BTreeMap<&str, (usize, i64)> = BTreeMap::new();
    for row in rows {
        let entry = per_category.entry(row.category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += row.marks as i64;
    }

    DashboardStats {
        total_interviews: total,
        average_score: (total > 0).then(|| round1(sum as f64 / total as f64)),
        best_score: rows.iter().map(|r| r.marks).max(),
        latest_score: rows.first().map(|r| r.marks),
        by_category: per_category
            .into_iter()
            .map(|(category, (count, sum))| CategoryStats {
                category: category.to_string(),
                count,
                average_score: round1(sum as f64 / count as f64),
            })
            .collect(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
