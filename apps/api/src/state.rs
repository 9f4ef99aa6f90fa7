use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthContext;
use crate::billing::entitlement::UsageLedger;
use crate::billing::payments::PaymentGateway;
use crate::config::Config;
use crate::interview::records::RecordStore;
use crate::interview::store::SessionStore;
use crate::llm_client::TextGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Interview session mirror. Redis when configured, in-process otherwise.
    pub sessions: Arc<dyn SessionStore>,
    /// Free/Pro usage counters consulted by the interview and export gates.
    pub usage: Arc<dyn UsageLedger>,
    pub records: Arc<dyn RecordStore>,
    /// Question and report delegates. Default: the Anthropic client.
    pub llm: Arc<dyn TextGenerator>,
    /// `None` when the gateway credentials are not configured.
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub auth: Arc<AuthContext>,
    pub config: Config,
}
