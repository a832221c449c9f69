use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use symptom_engine::TraversalState;
use uuid::Uuid;

use crate::error::Result;

/// One caller's interactive diagnosis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalSession {
    pub id: String,
    pub state: TraversalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TraversalSession {
    pub fn new(state: TraversalState) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Trait for storing and retrieving traversal sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: TraversalSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<TraversalSession>>;
    /// Returns whether a session was removed
    async fn delete(&self, id: &str) -> Result<bool>;
    /// Removes sessions last updated before `cutoff` and returns their ids
    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;
}

/// In-memory implementation of SessionStorage
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, TraversalSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: TraversalSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TraversalSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let idle: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.updated_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        // a session touched since the scan is kept
        Ok(idle
            .into_iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id, |_, session| session.updated_at < cutoff)
                    .is_some()
            })
            .collect())
    }
}
