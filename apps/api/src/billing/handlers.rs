use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::billing::entitlement::{evaluate, Entitlement};
use crate::billing::payments::{
    create_order, verify_and_activate, CreateOrderRequest, CreateOrderResponse, PaymentGateway,
    VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::errors::{AppError, PAYMENTS_NOT_CONFIGURED};
use crate::state::AppState;

fn gateway(state: &AppState) -> Result<Arc<dyn PaymentGateway>, AppError> {
    state
        .payments
        .clone()
        .ok_or(AppError::Configuration(PAYMENTS_NOT_CONFIGURED))
}

/// GET /api/v1/entitlement
pub async fn handle_get_entitlement(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Entitlement>, AppError> {
    let subscription = state.usage.subscription(user.user_id).await?;
    Ok(Json(evaluate(&subscription, Utc::now())))
}

/// POST /api/v1/billing/orders
/// Creating an order never changes the user's entitlement.
pub async fn handle_create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let gateway = gateway(&state)?;
    let response = create_order(
        &state.db,
        gateway.as_ref(),
        &state.config.pricing,
        user.user_id,
        req.billing_cycle,
    )
    .await?;
    Ok(Json(response))
}

/// POST /api/v1/billing/verify
pub async fn handle_verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let gateway = gateway(&state)?;
    let response = verify_and_activate(
        &state.db,
        gateway.as_ref(),
        &state.config.pricing,
        user.user_id,
        &req,
    )
    .await?;
    Ok(Json(response))
}
