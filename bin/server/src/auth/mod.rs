//! Authentication module for the latchkey server.
//!
//! This module provides:
//! - Signup and login through an external OIDC identity provider
//! - Store-backed sessions carried in a signed cookie
//! - An extractor for the signed-in user
//!
//! Which local account a provider identity maps to is decided by the
//! [`IdentityLinker`]; this module only moves the browser through the flow
//! and turns the linker's verdict into a session or a one-shot message.

pub mod middleware;
pub mod oidc;
pub mod provider;
pub mod routes;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use latchkey_identity::{IdentityLinker, SessionManager, SessionStore, UserStore};
use std::sync::Arc;

use crate::config::SessionConfig;

pub use middleware::CurrentUser;
pub use oidc::OidcClient;
pub use provider::{AuthState, IdentityProvider, ProviderError};
pub use routes::{AuthError, login, login_callback, logout, signup, signup_callback};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Identity provider for the authorization-code flow.
    pub provider: Arc<dyn IdentityProvider>,
    /// Resolves provider identities to local accounts.
    pub linker: IdentityLinker,
    /// Session lifecycle.
    pub sessions: SessionManager,
    /// Session configuration.
    pub session_config: SessionConfig,
    /// Key used to sign cookies.
    pub cookie_key: Key,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
        session_config: SessionConfig,
        cookie_key: Key,
    ) -> Self {
        Self {
            provider,
            linker: IdentityLinker::new(users.clone()),
            sessions: SessionManager::new(sessions, users, session_config.duration()),
            session_config,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
