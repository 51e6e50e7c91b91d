//! Session lifecycle.
//!
//! The manager turns an authenticated user into a server-side session and
//! back again. Sessions store only the principal; the full user is re-read
//! from the user store on every request.

use chrono::Duration;
use latchkey_core::{Result, SessionId};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::principal::{self, Principal};
use crate::session::Session;
use crate::store::{SessionStore, UserStore};
use crate::user::User;

/// Establishes, reads, and ends browser sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    duration: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        duration: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            duration,
        }
    }

    /// Reduces `user` to the principal stored in a session.
    #[must_use]
    pub fn to_principal(user: &User) -> Principal {
        principal::to_principal(user)
    }

    /// Fetches the current user behind `principal`.
    ///
    /// Returns `None` when the id no longer resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the user store fails.
    pub async fn from_principal(&self, principal: &Principal) -> Result<Option<User>, StoreError> {
        self.users.find_by_id(principal.user_id).await
    }

    /// Loads a live session.
    ///
    /// Expired sessions are deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        match self.sessions.load(id).await? {
            Some(session) if session.is_expired() => {
                debug!(session_id = %id, "discarding expired session");
                self.sessions.delete(id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Starts an authenticated session for `user`.
    ///
    /// Always issues a fresh session id; the `previous` session, if any, is
    /// deleted so an id handed out before login never becomes authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn establish(
        &self,
        previous: Option<SessionId>,
        user: &User,
    ) -> Result<Session, StoreError> {
        if let Some(previous) = previous {
            self.sessions.delete(previous).await?;
        }

        let mut session = Session::new(self.duration);
        session.set_principal(Self::to_principal(user));
        self.sessions.save(&session).await?;

        info!(session_id = %session.id(), "session established");
        Ok(session)
    }

    /// Stores a one-shot message for the next page view.
    ///
    /// The message goes into the `previous` session while it is live, or
    /// into a new anonymous session otherwise. The principal is left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, message))]
    pub async fn flash(
        &self,
        previous: Option<SessionId>,
        message: &str,
    ) -> Result<Session, StoreError> {
        let existing = match previous {
            Some(id) => self.load(id).await?,
            None => None,
        };

        let mut session = existing.unwrap_or_else(|| Session::new(self.duration));
        session.set_flash_error(message);
        self.sessions.save(&session).await?;
        Ok(session)
    }

    /// Returns and clears the one-shot message of a live session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn take_flash(&self, id: SessionId) -> Result<Option<String>, StoreError> {
        let Some(mut session) = self.load(id).await? else {
            return Ok(None);
        };

        let message = session.take_flash_error();
        if message.is_some() {
            self.sessions.save(&session).await?;
        }
        Ok(message)
    }

    /// Resolves the user signed in to session `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn current_user(&self, id: SessionId) -> Result<Option<User>, StoreError> {
        let Some(session) = self.load(id).await? else {
            return Ok(None);
        };

        match session.principal() {
            Some(principal) => self.from_principal(principal).await,
            None => Ok(None),
        }
    }

    /// Ends session `id`. Ending a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self))]
    pub async fn destroy(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions.delete(id).await?;
        info!("session destroyed");
        Ok(())
    }

    /// Deletes every expired session and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let removed = self.sessions.delete_expired().await?;
        if removed > 0 {
            info!(removed, "purged expired sessions");
        }
        Ok(removed)
    }
}
