//! Storage seams for users and sessions.
//!
//! Durability and uniqueness are the store's job. Both implementations
//! enforce unique emails and unique external ids, and report a violation
//! as `WriteOutcome::Conflict` rather than an error so callers can treat a
//! lost signup race as an ordinary outcome.

use async_trait::async_trait;
use latchkey_core::{Result, SessionId, UserId};

use crate::error::StoreError;
use crate::session::Session;
use crate::user::User;

/// Result of an insert or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Applied,
    /// The write would duplicate another account's email or external id.
    Conflict,
}

/// Persistence of user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by internal ID, blocked or not.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Finds a user by exact email, blocked or not.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Finds a non-blocked user by external identity.
    async fn find_active_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Finds a non-blocked user by exact email.
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new user.
    async fn insert(&self, user: &User) -> Result<WriteOutcome, StoreError>;

    /// Replaces the mutable fields of an existing user, matched by ID.
    async fn update(&self, user: &User) -> Result<WriteOutcome, StoreError>;
}

/// Persistence of browser sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session by ID, including expired ones.
    async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Inserts or replaces a session.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Deletes a session. Deleting a missing session is not an error.
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;

    /// Deletes expired sessions and returns how many were removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}
