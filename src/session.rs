//! Session tracker: in-flight ANP↔MCP correlations.
//!
//! A session is created when the bridge issues an outbound MCP call and
//! retired by exactly one of `complete`, `expire_stale`, or `delete`. Every
//! operation takes the tracker's lock for the full mutation, so terminal
//! transitions cannot interleave: the first one wins and removes the session
//! from the live set, the second observes `UnknownSession`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::AnpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Completed,
    Expired,
    Deleted,
}

/// One tracked correlation. The key doubles as the ANP request id and the
/// MCP JSON-RPC id.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub key: String,
    pub did: String,
    pub request: AnpRequest,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
    /// Monotonic open time, used for TTL accounting.
    #[serde(skip)]
    opened: Instant,
}

impl Session {
    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }
}

#[derive(Debug)]
pub struct SessionTracker {
    live: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionTracker {
    pub fn new(ttl: Duration) -> Self {
        Self { live: RwLock::new(HashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for `key`. At most one open session per key may exist.
    pub async fn open(&self, key: &str, did: &str, request: AnpRequest) -> BridgeResult<Session> {
        let mut live = self.live.write().await;
        if live.contains_key(key) {
            return Err(BridgeError::DuplicateSessionKey(key.to_string()));
        }
        let session = Session {
            key: key.to_string(),
            did: did.to_string(),
            request,
            created_at: Utc::now(),
            state: SessionState::Open,
            opened: Instant::now(),
        };
        live.insert(key.to_string(), session.clone());
        tracing::debug!(key = %key, did = %did, "session opened");
        Ok(session)
    }

    /// Whether `key` currently denotes an open session.
    pub async fn contains(&self, key: &str) -> bool {
        self.live.read().await.contains_key(key)
    }

    /// Fetch the open session for `key`. Fails with `UnknownSession` whether
    /// the key was never opened or already retired — callers cannot tell the
    /// two apart.
    pub async fn lookup(&self, key: &str) -> BridgeResult<Session> {
        self.live
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownSession(key.to_string()))
    }

    /// Transition Open → Completed and remove the session in one atomic step.
    pub async fn complete(&self, key: &str) -> BridgeResult<Session> {
        let mut live = self.live.write().await;
        let mut session = live
            .remove(key)
            .ok_or_else(|| BridgeError::UnknownSession(key.to_string()))?;
        session.state = SessionState::Completed;
        tracing::debug!(key = %key, "session completed");
        Ok(session)
    }

    /// Remove the session regardless of state. Idempotent; returns the
    /// retired session when one existed.
    pub async fn delete(&self, key: &str) -> Option<Session> {
        let mut session = self.live.write().await.remove(key)?;
        session.state = SessionState::Deleted;
        tracing::debug!(key = %key, "session deleted");
        Some(session)
    }

    /// Expire every open session older than the TTL. Returns the keys that
    /// were retired. Invoked by the background sweep.
    pub async fn expire_stale(&self) -> Vec<String> {
        let mut live = self.live.write().await;
        let stale: Vec<String> = live
            .values()
            .filter(|s| s.age() > self.ttl)
            .map(|s| s.key.clone())
            .collect();
        for key in &stale {
            if let Some(mut session) = live.remove(key) {
                session.state = SessionState::Expired;
                tracing::warn!(key = %key, did = %session.did, "session expired without a response");
            }
        }
        stale
    }

    pub async fn len(&self) -> usize {
        self.live.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.read().await.is_empty()
    }
}

/// Spawn the periodic expiry sweep. Prevents unbounded growth from MCP calls
/// that never return.
pub fn spawn_sweeper(
    tracker: std::sync::Arc<SessionTracker>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "session sweeper: started (interval={}s, ttl={}s)",
            interval.as_secs(),
            tracker.ttl().as_secs()
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so a fresh tracker is not
        // swept before it has served anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = tracker.expire_stale().await;
            if !expired.is_empty() {
                tracing::warn!("session sweeper: expired {} stale session(s)", expired.len());
            }
        }
    })
}
