//! Server-side session records.
//!
//! A session is keyed by an opaque `SessionId` carried in a signed cookie.
//! It holds the authenticated principal, if any, and a one-shot message
//! shown on the next page view.

use chrono::{DateTime, Duration, Utc};
use latchkey_core::SessionId;
use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// A browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    /// Set once the browser has authenticated.
    principal: Option<Principal>,
    /// Message shown once on the next page view, then cleared.
    flash_error: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session valid for `duration`.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            principal: None,
            flash_error: None,
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Creates a session with all fields specified.
    ///
    /// Use this when reconstituting a session from storage.
    #[must_use]
    pub fn with_all_fields(
        id: SessionId,
        principal: Option<Principal>,
        flash_error: Option<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            principal,
            flash_error,
            created_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn flash_error(&self) -> Option<&str> {
        self.flash_error.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    pub fn set_flash_error(&mut self, message: impl Into<String>) {
        self.flash_error = Some(message.into());
    }

    /// Removes and returns the one-shot message.
    pub fn take_flash_error(&mut self) -> Option<String> {
        self.flash_error.take()
    }
}
