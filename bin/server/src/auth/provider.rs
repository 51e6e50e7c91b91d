//! The identity provider seam.
//!
//! Routes talk to the provider only through [`IdentityProvider`], so the
//! OIDC client can be swapped for a fake in tests.

use async_trait::async_trait;
use latchkey_core::Result;
use latchkey_identity::{ExternalProfile, FlowIntent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data needed to complete the callback, kept by the browser between the
/// redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub nonce: String,
}

/// An external identity provider using the authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the URL the browser is sent to for `intent`, along with the
    /// state needed to verify the callback.
    fn authorization_url(&self, intent: FlowIntent) -> (String, AuthState);

    /// Exchanges an authorization code for the verified profile it grants.
    async fn exchange_code(
        &self,
        intent: FlowIntent,
        code: &str,
        state: &AuthState,
    ) -> Result<ExternalProfile, ProviderError>;
}

/// Identity provider errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
    /// Token exchange failed.
    TokenExchange(String),
    /// Token validation failed.
    TokenValidation(String),
    /// The verified token lacks a claim we depend on.
    MissingClaim { claim: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {msg}"),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {msg}"),
            Self::TokenExchange(msg) => write!(f, "OIDC token exchange error: {msg}"),
            Self::TokenValidation(msg) => write!(f, "OIDC token validation error: {msg}"),
            Self::MissingClaim { claim } => write!(f, "ID token is missing claim '{claim}'"),
        }
    }
}

impl std::error::Error for ProviderError {}
