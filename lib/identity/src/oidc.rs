//! OpenID Connect provider configuration.
//!
//! Google is the default provider. Any OIDC issuer that supports discovery
//! and the authorization-code flow works.

use serde::{Deserialize, Serialize};

use crate::profile::FlowIntent;

/// Issuer used when none is configured.
pub const GOOGLE_ISSUER_URL: &str = "https://accounts.google.com";

/// Configuration for the OIDC identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// The OIDC issuer URL, used for discovery.
    #[serde(default = "default_issuer_url")]
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,email,profile"
    #[serde(default = "default_scopes")]
    scopes: String,
}

fn default_issuer_url() -> String {
    GOOGLE_ISSUER_URL.to_string()
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

impl OidcConfig {
    /// Creates a Google configuration with the default scopes.
    #[must_use]
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            issuer_url: default_issuer_url(),
            client_id,
            client_secret,
            scopes: default_scopes(),
        }
    }

    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 scopes to request, parsed from comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Returns the callback URI registered for `intent` under `public_url`.
///
/// Each intent has its own callback so the provider's redirect alone tells
/// which flow is completing.
#[must_use]
pub fn redirect_uri(public_url: &str, intent: FlowIntent) -> String {
    format!(
        "{}/auth/google/{}/callback",
        public_url.trim_end_matches('/'),
        intent.as_str()
    )
}
