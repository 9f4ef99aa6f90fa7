use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRow {
    pub user_id: Uuid,
    pub is_pro: bool,
    pub billing_cycle: Option<String>,
    pub pro_expires_at: Option<DateTime<Utc>>,
    pub interviews_taken: i32,
    pub reports_downloaded: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
