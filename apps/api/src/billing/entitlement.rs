//! Entitlement gate.
//!
//! Free users get one lifetime interview and one lifetime report download.
//! Pro users have unlimited access until `pro_expires_at`; after that the
//! free rules apply again, with whatever free usage was already consumed.
//!
//! Usage is tracked in counter columns on `subscriptions` and claimed with
//! a conditional UPDATE, so the limit holds no matter what the client sends
//! and even when requests race.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::billing::models::BillingCycle;
use crate::models::billing::SubscriptionRow;

pub const FREE_INTERVIEW_ALLOWANCE: i32 = 1;
pub const FREE_REPORT_ALLOWANCE: i32 = 1;

pub const INTERVIEW_UPGRADE_MESSAGE: &str =
    "You have used your free interview. Upgrade to Pro for unlimited interviews.";
pub const REPORT_UPGRADE_MESSAGE: &str =
    "You have used your free report download. Upgrade to Pro to download more reports.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub tier: Tier,
    pub billing_cycle: Option<BillingCycle>,
    pub pro_expires_at: Option<DateTime<Utc>>,
    pub interviews_taken: i32,
    pub reports_downloaded: i32,
    pub can_start_interview: bool,
    pub can_download_report: bool,
}

pub fn is_pro_active(sub: &SubscriptionRow, now: DateTime<Utc>) -> bool {
    sub.is_pro && sub.pro_expires_at.is_some_and(|expires| expires > now)
}

pub fn evaluate(sub: &SubscriptionRow, now: DateTime<Utc>) -> Entitlement {
    let pro = is_pro_active(sub, now);
    Entitlement {
        tier: if pro { Tier::Pro } else { Tier::Free },
        billing_cycle: if pro {
            sub.billing_cycle.as_deref().and_then(|c| c.parse().ok())
        } else {
            None
        },
        pro_expires_at: if pro { sub.pro_expires_at } else { None },
        interviews_taken: sub.interviews_taken,
        reports_downloaded: sub.reports_downloaded,
        can_start_interview: pro || sub.interviews_taken < FREE_INTERVIEW_ALLOWANCE,
        can_download_report: pro || sub.reports_downloaded < FREE_REPORT_ALLOWANCE,
    }
}

/// New access runs from the later of now and the current expiry.
pub fn extended_expiry(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cycle: BillingCycle,
) -> DateTime<Utc> {
    let start = current.filter(|expires| *expires > now).unwrap_or(now);
    start + cycle.duration()
}

/// Where the gate reads subscriptions and claims usage.
///
/// Carried in `AppState` as `Arc<dyn UsageLedger>`; claims must be atomic
/// with respect to the allowance check.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn subscription(&self, user_id: Uuid) -> Result<SubscriptionRow>;

    async fn claim_interview(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    async fn claim_report_download(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool>;
}

/// Ledger backed by the `subscriptions` table.
pub struct PgUsageLedger {
    pool: PgPool,
}

impl PgUsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn subscription(&self, user_id: Uuid) -> Result<SubscriptionRow> {
        ensure_subscription(&self.pool, user_id).await
    }

    async fn claim_interview(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        claim_interview(&self.pool, user_id, now).await
    }

    async fn claim_report_download(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        claim_report_download(&self.pool, user_id, now).await
    }
}

/// Returns the user's subscription, creating the free-tier row on first use.
pub async fn ensure_subscription(pool: &PgPool, user_id: Uuid) -> Result<SubscriptionRow> {
    sqlx::query("INSERT INTO subscriptions (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(
        sqlx::query_as::<_, SubscriptionRow>("SELECT * FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Consumes one interview if the user is entitled to it.
pub async fn claim_interview(pool: &PgPool, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET interviews_taken = interviews_taken + 1, updated_at = now()
        WHERE user_id = $1
          AND ((is_pro AND pro_expires_at > $2) OR interviews_taken < $3)
        "#,
    )
    .bind(user_id)
    .bind(now)
    .bind(FREE_INTERVIEW_ALLOWANCE)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Consumes one report download if the user is entitled to it.
pub async fn claim_report_download(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET reports_downloaded = reports_downloaded + 1, updated_at = now()
        WHERE user_id = $1
          AND ((is_pro AND pro_expires_at > $2) OR reports_downloaded < $3)
        "#,
    )
    .bind(user_id)
    .bind(now)
    .bind(FREE_REPORT_ALLOWANCE)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Flips the user to Pro for one billing cycle. Must only be called once a
/// payment has been verified, inside the transaction that records it.
pub async fn activate_pro(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    cycle: BillingCycle,
    now: DateTime<Utc>,
) -> Result<SubscriptionRow> {
    sqlx::query("INSERT INTO subscriptions (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let current = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT * FROM subscriptions WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let current_expiry = if current.is_pro {
        current.pro_expires_at
    } else {
        None
    };
    let expires_at = extended_expiry(current_expiry, now, cycle);

    let updated = sqlx::query_as::<_, SubscriptionRow>(
        r#"
        UPDATE subscriptions
        SET is_pro = TRUE, billing_cycle = $2, pro_expires_at = $3, updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(cycle.as_str())
    .bind(expires_at)
    .fetch_one(&mut **tx)
    .await?;

    info!(
        "Activated Pro ({}) for user {user_id} until {expires_at}",
        cycle.as_str()
    );
    Ok(updated)
}
