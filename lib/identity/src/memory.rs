//! In-memory stores.
//!
//! Used when the server runs without a database, and as fakes in tests.
//! State is lost on restart.

use async_trait::async_trait;
use latchkey_core::{Result, SessionId, UserId};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::session::Session;
use crate::store::{SessionStore, UserStore, WriteOutcome};
use crate::user::User;

/// User store backed by a map.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored user.
    pub async fn all(&self) -> Vec<User> {
        self.users.lock().await.values().cloned().collect()
    }

    /// Returns true if another user already owns `user`'s email or external id.
    fn collides(users: &HashMap<UserId, User>, user: &User) -> bool {
        users.values().any(|other| {
            other.id() != user.id()
                && (other.email() == user.email()
                    || (user.external_id().is_some()
                        && other.external_id() == user.external_id()))
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.email() == email)
            .cloned())
    }

    async fn find_active_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| !u.is_blocked() && u.external_id() == Some(external_id))
            .cloned())
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| !u.is_blocked() && u.email() == email)
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.id()) || Self::collides(&users, user) {
            return Ok(WriteOutcome::Conflict);
        }
        users.insert(user.id(), user.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn update(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        let mut users = self.users.lock().await;
        if Self::collides(&users, user) {
            return Ok(WriteOutcome::Conflict);
        }
        // Updating a missing row is a no-op, as with `UPDATE ... WHERE id = $1`.
        if let Some(existing) = users.get_mut(&user.id()) {
            *existing = user.clone();
        }
        Ok(WriteOutcome::Applied)
    }
}

/// Session store backed by a map.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(&id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(session.id(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(&id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}
