mod auth;
mod billing;
mod config;
mod db;
mod documents;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::AuthContext;
use crate::billing::entitlement::PgUsageLedger;
use crate::billing::payments::{PaymentGateway, RazorpayGateway};
use crate::config::Config;
use crate::db::create_pool;
use crate::interview::records::PgRecordStore;
use crate::interview::store::{MemorySessionStore, RedisSessionStore, SessionStore};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PrepBuddy API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;

    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Session mirror: Redis (ttl {}s)", config.session_ttl_secs);
            Arc::new(RedisSessionStore::new(client, config.session_ttl_secs))
        }
        None => {
            warn!("REDIS_URL not set; sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStore::default())
        }
    };

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("ANTHROPIC_API_KEY not set; interview generation and scoring are disabled");
    }

    let payments: Option<Arc<dyn PaymentGateway>> =
        match (&config.razorpay_key_id, &config.razorpay_key_secret) {
            (Some(key_id), Some(key_secret)) => {
                let gateway: Arc<dyn PaymentGateway> =
                    Arc::new(RazorpayGateway::new(key_id.clone(), key_secret.clone())?);
                info!("Payment gateway initialized (key {key_id})");
                Some(gateway)
            }
            _ => {
                warn!("Razorpay credentials not set; upgrades are disabled");
                None
            }
        };

    let auth = Arc::new(AuthContext::new(
        &config.auth_jwt_secret,
        config.auth_jwt_audience.as_deref(),
    ));

    let state = AppState {
        usage: Arc::new(PgUsageLedger::new(db.clone())),
        records: Arc::new(PgRecordStore::new(db.clone())),
        db,
        sessions,
        llm: Arc::new(llm),
        payments,
        auth,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web client's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
