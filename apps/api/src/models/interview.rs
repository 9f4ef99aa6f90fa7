use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One completed interview. Insert-only; `id` is the session id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub difficulty: String,
    pub marks: i32,
    /// `{ questions, answers, feedback }` as written at completion.
    pub script: Value,
    pub interview_date: NaiveDate,
    pub interview_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}
