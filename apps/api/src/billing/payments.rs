//! Payment orders and verification.
//!
//! Creating an order never changes entitlement. Only a verified payment
//! (gateway signature + order lookup) activates Pro, and each order
//! activates at most once.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::entitlement::{activate_pro, ensure_subscription, evaluate, Entitlement};
use crate::billing::models::{BillingCycle, PlanPricing};
use crate::errors::AppError;

const RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment gateway error (status {status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("payment signature is invalid")]
    InvalidSignature,

    #[error("payment does not match the order: {0}")]
    OrderMismatch(String),
}

/// Metadata attached to every order so verification can trust the gateway's
/// copy rather than the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderNotes {
    pub user_id: String,
    pub billing_cycle: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    /// The gateway returns `[]` for orders without notes.
    #[serde(default)]
    pub notes: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id the browser checkout needs.
    fn key_id(&self) -> &str;

    async fn create_order(&self, order: &OrderRequest) -> Result<GatewayOrder, PaymentError>;

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, PaymentError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Razorpay Orders API.
pub struct RazorpayGateway {
    client: Client,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            key_id,
            key_secret,
        })
    }

    async fn parse(response: reqwest::Response) -> Result<GatewayOrder, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["description"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, order: &OrderRequest) -> Result<GatewayOrder, PaymentError> {
        let response = self
            .client
            .post(format!("{RAZORPAY_API_URL}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(order)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, PaymentError> {
        let response = self
            .client
            .get(format!("{RAZORPAY_API_URL}/orders/{order_id}"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        Self::parse(response).await
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Checks the gateway's hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Some(tag) = decode_hex(signature.trim()) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, format!("{order_id}|{payment_id}").as_bytes(), &tag).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

/// Confirms the gateway's order belongs to `user_id` and charges the price
/// of the cycle recorded in its notes.
pub fn check_order(
    order: &GatewayOrder,
    user_id: Uuid,
    pricing: &PlanPricing,
) -> Result<BillingCycle, PaymentError> {
    let notes: OrderNotes = serde_json::from_value(order.notes.clone())
        .map_err(|_| PaymentError::OrderMismatch("order has no billing notes".to_string()))?;
    if notes.user_id != user_id.to_string() {
        return Err(PaymentError::OrderMismatch(
            "order belongs to another user".to_string(),
        ));
    }
    let cycle: BillingCycle = notes
        .billing_cycle
        .parse()
        .map_err(PaymentError::OrderMismatch)?;
    if order.amount != pricing.amount_for(cycle) || order.currency != pricing.currency {
        return Err(PaymentError::OrderMismatch(format!(
            "order charges {} {} for the {} plan",
            order.amount,
            order.currency,
            cycle.as_str()
        )));
    }
    Ok(cycle)
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub entitlement: Entitlement,
    /// True when this order had already been applied earlier.
    pub already_applied: bool,
}

pub async fn create_order(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    pricing: &PlanPricing,
    user_id: Uuid,
    cycle: BillingCycle,
) -> Result<CreateOrderResponse, AppError> {
    let amount = pricing.amount_for(cycle);
    let order = gateway
        .create_order(&OrderRequest {
            amount,
            currency: pricing.currency.clone(),
            receipt: format!("pb_{}", Uuid::new_v4().simple()),
            notes: OrderNotes {
                user_id: user_id.to_string(),
                billing_cycle: cycle.as_str().to_string(),
            },
        })
        .await?;

    info!(
        "Created {} order {} for user {user_id}",
        cycle.as_str(),
        order.id
    );

    // Pending row is bookkeeping only; the order is valid without it.
    if let Err(e) = record_pending_payment(pool, &order, user_id, cycle).await {
        warn!("Failed to record pending payment {}: {e}", order.id);
    }

    Ok(CreateOrderResponse {
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id: gateway.key_id().to_string(),
    })
}

async fn record_pending_payment(
    pool: &PgPool,
    order: &GatewayOrder,
    user_id: Uuid,
    cycle: BillingCycle,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payments (order_id, user_id, billing_cycle, amount, currency, status)
        VALUES ($1, $2, $3, $4, $5, 'created')
        ON CONFLICT (order_id) DO NOTHING
        "#,
    )
    .bind(&order.id)
    .bind(user_id)
    .bind(cycle.as_str())
    .bind(order.amount as i64)
    .bind(&order.currency)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn verify_and_activate(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    pricing: &PlanPricing,
    user_id: Uuid,
    request: &VerifyPaymentRequest,
) -> Result<VerifyPaymentResponse, AppError> {
    if !gateway.verify_signature(&request.order_id, &request.payment_id, &request.signature) {
        warn!(
            "Rejected payment {} for order {}: bad signature",
            request.payment_id, request.order_id
        );
        return Err(PaymentError::InvalidSignature.into());
    }

    let order = gateway.fetch_order(&request.order_id).await?;
    let cycle = check_order(&order, user_id, pricing)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let newly_paid: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO payments (order_id, user_id, billing_cycle, amount, currency, status, payment_id)
        VALUES ($1, $2, $3, $4, $5, 'paid', $6)
        ON CONFLICT (order_id) DO UPDATE
            SET status = 'paid', payment_id = EXCLUDED.payment_id, updated_at = now()
            WHERE payments.status <> 'paid'
        RETURNING order_id
        "#,
    )
    .bind(&order.id)
    .bind(user_id)
    .bind(cycle.as_str())
    .bind(order.amount as i64)
    .bind(&order.currency)
    .bind(&request.payment_id)
    .fetch_optional(&mut *tx)
    .await?;

    let already_applied = newly_paid.is_none();
    if !already_applied {
        activate_pro(&mut tx, user_id, cycle, now).await?;
    }
    tx.commit().await?;

    if already_applied {
        info!("Order {} was already applied; not extending again", order.id);
    }

    let subscription = ensure_subscription(pool, user_id).await?;
    Ok(VerifyPaymentResponse {
        entitlement: evaluate(&subscription, now),
        already_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test_secret";

    fn sign(order_id: &str, payment_id: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, SECRET.as_bytes());
        let tag = hmac::sign(&key, format!("{order_id}|{payment_id}").as_bytes());
        tag.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    fn pricing() -> PlanPricing {
        PlanPricing {
            monthly_amount: 29_900,
            yearly_amount: 249_900,
            currency: "INR".to_string(),
        }
    }

    fn order(user_id: Uuid, cycle: &str, amount: u64) -> GatewayOrder {
        GatewayOrder {
            id: "order_123".to_string(),
            amount,
            currency: "INR".to_string(),
            status: "paid".to_string(),
            notes: json!({ "user_id": user_id.to_string(), "billing_cycle": cycle }),
        }
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let sig = sign("order_123", "pay_456");
        assert!(verify_payment_signature(SECRET, "order_123", "pay_456", &sig));
        assert!(verify_payment_signature(
            SECRET,
            "order_123",
            "pay_456",
            &sig.to_uppercase()
        ));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let sig = sign("order_123", "pay_456");
        assert!(!verify_payment_signature(SECRET, "order_999", "pay_456", &sig));
        assert!(!verify_payment_signature("other", "order_123", "pay_456", &sig));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", "zz"));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", ""));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", "abc"));
    }

    #[test]
    fn test_check_order_reads_cycle_from_notes() {
        let user = Uuid::new_v4();
        let cycle = check_order(&order(user, "yearly", 249_900), user, &pricing()).unwrap();
        assert_eq!(cycle, BillingCycle::Yearly);
    }

    #[test]
    fn test_check_order_rejects_other_users_order() {
        let err = check_order(
            &order(Uuid::new_v4(), "monthly", 29_900),
            Uuid::new_v4(),
            &pricing(),
        )
        .unwrap_err();
        assert!(matches!(err, PaymentError::OrderMismatch(_)));
    }

    #[test]
    fn test_check_order_rejects_underpriced_order() {
        let user = Uuid::new_v4();
        assert!(check_order(&order(user, "yearly", 29_900), user, &pricing()).is_err());
    }

    #[test]
    fn test_check_order_rejects_empty_notes() {
        let user = Uuid::new_v4();
        let mut o = order(user, "monthly", 29_900);
        o.notes = json!([]);
        assert!(check_order(&o, user, &pricing()).is_err());
    }

    #[test]
    fn test_gateway_order_parses_without_notes() {
        let o: GatewayOrder = serde_json::from_value(json!({
            "id": "order_1",
            "entity": "order",
            "amount": 29900,
            "currency": "INR",
            "status": "created"
        }))
        .unwrap();
        assert!(o.notes.is_null());
    }
}
