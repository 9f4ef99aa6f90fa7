//! Session mirror.
//!
//! Each interview session is stored as one JSON snapshot keyed by its id.
//! Saves overwrite the whole snapshot (last write wins) and bump
//! `revision`, so a client can tell when another tab moved the session on.
//! Deleting the key is the only way a session ends. Only `save` creates a
//! key; every later write goes through `replace`, which refuses to write a
//! key that is gone, so a reset session cannot be brought back.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::interview::session::InterviewSession;

const KEY_PREFIX: &str = "prepbuddy:session:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt session snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError>;

    /// Bumps `session.revision`, then replaces the stored snapshot.
    async fn save(&self, session: &mut InterviewSession) -> Result<(), StoreError>;

    /// Like `save`, but only if the snapshot still exists. Returns `false`
    /// and writes nothing when the session has been deleted.
    async fn replace(&self, session: &mut InterviewSession) -> Result<bool, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

fn session_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn stamp(session: &mut InterviewSession) {
    session.revision += 1;
    session.updated_at = chrono::Utc::now();
}

/// Redis-backed mirror. Snapshots expire after `ttl_secs` of inactivity.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(session_key(id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(&self, session: &mut InterviewSession) -> Result<(), StoreError> {
        stamp(session);
        let json = serde_json::to_string(session)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(session_key(session.id), json, self.ttl_secs)
            .await?;
        debug!(
            "Saved session {} at revision {}",
            session.id, session.revision
        );
        Ok(())
    }

    async fn replace(&self, session: &mut InterviewSession) -> Result<bool, StoreError> {
        stamp(session);
        let json = serde_json::to_string(session)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // SET .. XX replies nil when the key does not exist.
        let reply: Option<String> = redis::cmd("SET")
            .arg(session_key(session.id))
            .arg(json)
            .arg("XX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        let written = reply.is_some();
        if written {
            debug!(
                "Replaced session {} at revision {}",
                session.id, session.revision
            );
        }
        Ok(written)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(session_key(id)).await?;
        Ok(())
    }
}

/// Process-local mirror used when no Redis URL is configured, and in tests.
/// Stores serialized snapshots so it behaves like the Redis store.
#[derive(Default)]
pub struct MemorySessionStore {
    snapshots: RwLock<HashMap<Uuid, String>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(&id)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(&self, session: &mut InterviewSession) -> Result<(), StoreError> {
        stamp(session);
        let json = serde_json::to_string(session)?;
        self.snapshots.write().await.insert(session.id, json);
        Ok(())
    }

    async fn replace(&self, session: &mut InterviewSession) -> Result<bool, StoreError> {
        stamp(session);
        let json = serde_json::to_string(session)?;
        let mut snapshots = self.snapshots.write().await;
        match snapshots.get_mut(&session.id) {
            Some(slot) => {
                *slot = json;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.snapshots.write().await.remove(&id);
        Ok(())
    }
}
