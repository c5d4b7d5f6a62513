//! Session storage for in-progress forms
//!
//! One [`FormSession`] per conversation. Sessions live in memory only; a
//! restart loses every in-flight order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::form::SlotFillingForm;

/// Conversation key chosen by the host (user id, chat id, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Form state for one conversation
#[derive(Debug)]
pub struct FormSession {
    pub form: SlotFillingForm,
    /// Last follow-up question asked, repeated on a no-progress turn
    pub last_question: Option<String>,
    /// Field the last question was about
    pub last_field: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl FormSession {
    pub fn new(form: SlotFillingForm) -> Self {
        let now = Utc::now();
        Self {
            form,
            last_question: None,
            last_field: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Shared handle to a session.
///
/// The mutex serializes turns within a session; different sessions proceed
/// independently.
pub type SessionHandle = Arc<Mutex<FormSession>>;

/// Session-keyed storage owned by the dialogue driver
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Option<SessionHandle>;

    /// Insert or replace; returns the previous session, if any
    async fn put(&self, id: SessionId, session: FormSession) -> Option<SessionHandle>;

    async fn remove(&self, id: &SessionId) -> Option<SessionHandle>;

    /// Remove `id` only while it still maps to `handle`
    async fn remove_handle(&self, id: &SessionId, handle: &SessionHandle) -> bool;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn put(&self, id: SessionId, session: FormSession) -> Option<SessionHandle> {
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)))
    }

    async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    async fn remove_handle(&self, id: &SessionId, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|h| Arc::ptr_eq(h, handle)) {
            sessions.remove(id);
            true
        } else {
            false
        }
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
