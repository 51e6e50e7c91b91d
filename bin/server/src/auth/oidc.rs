//! OIDC client implementation using the openidconnect crate.

use async_trait::async_trait;
use latchkey_core::Result;
use latchkey_identity::{
    ExternalProfile, FlowIntent, GOOGLE_ISSUER_URL, OidcConfig, redirect_uri,
};
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata,
};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use tracing::{debug, warn};

use super::provider::{AuthState, IdentityProvider, ProviderError};

/// OIDC client for authenticating users against a discovered provider.
pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    signup_redirect: RedirectUrl,
    login_redirect: RedirectUrl,
    http_client: reqwest::Client,
    config: OidcConfig,
}

impl OidcClient {
    /// Creates a new OIDC client by discovering the provider metadata.
    ///
    /// Callback URIs are derived from `public_url`, one per flow intent.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is invalid or discovery fails.
    pub async fn discover(config: OidcConfig, public_url: &str) -> Result<Self, ProviderError> {
        let issuer_url = IssuerUrl::new(config.issuer_url().to_string())
            .map_err(|e| ProviderError::Configuration(format!("invalid issuer URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| ProviderError::Discovery(format!("failed to discover provider: {e}")))?;

        let signup_redirect = Self::redirect_url(public_url, FlowIntent::Signup)?;
        let login_redirect = Self::redirect_url(public_url, FlowIntent::Login)?;

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            signup_redirect,
            login_redirect,
            http_client,
            config,
        })
    }

    fn redirect_url(public_url: &str, intent: FlowIntent) -> Result<RedirectUrl, ProviderError> {
        RedirectUrl::new(redirect_uri(public_url, intent)).map_err(|e| {
            ProviderError::Configuration(format!("invalid {intent} redirect URI: {e}")).into()
        })
    }

    /// Google always sends `email_verified` with the email scope, and only
    /// issues addresses it has verified. Other issuers must flag the email.
    fn trusts_unflagged_email(&self) -> bool {
        self.config.issuer_url() == GOOGLE_ISSUER_URL
    }

    fn redirect_for(&self, intent: FlowIntent) -> RedirectUrl {
        match intent {
            FlowIntent::Signup => self.signup_redirect.clone(),
            FlowIntent::Login => self.login_redirect.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn authorization_url(&self, intent: FlowIntent) -> (String, AuthState) {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_for(intent));

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        let state = AuthState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        };

        (auth_url.to_string(), state)
    }

    async fn exchange_code(
        &self,
        intent: FlowIntent,
        code: &str,
        state: &AuthState,
    ) -> Result<ExternalProfile, ProviderError> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_for(intent));

        let pkce_verifier = PkceCodeVerifier::new(state.pkce_verifier.clone());

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| ProviderError::TokenExchange(format!("token endpoint error: {e}")))?;

        let token_response = token_request
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| ProviderError::TokenExchange(format!("token exchange failed: {e}")))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| ProviderError::TokenExchange("no ID token in response".to_string()))?;

        let nonce = Nonce::new(state.nonce.clone());
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| {
                ProviderError::TokenValidation(format!("ID token validation failed: {e}"))
            })?;

        let profile = profile_from_claims(claims, self.trusts_unflagged_email())?;
        debug!(
            intent = %intent,
            has_email = !profile.emails.is_empty(),
            "ID token verified"
        );

        Ok(profile)
    }
}

/// Maps verified ID token claims to an external profile.
///
/// The email is only carried over when the issuer vouches for it: an
/// explicit `email_verified: false` always drops it, and a missing flag
/// drops it unless `trust_unflagged_email` is set.
fn profile_from_claims(
    claims: &CoreIdTokenClaims,
    trust_unflagged_email: bool,
) -> Result<ExternalProfile, ProviderError> {
    let subject = claims.subject().to_string();
    if subject.is_empty() {
        return Err(ProviderError::MissingClaim {
            claim: "sub".to_string(),
        }
        .into());
    }

    let email_verified = claims.email_verified().unwrap_or(trust_unflagged_email);
    let email = claims
        .email()
        .filter(|_| email_verified)
        .map(|e| e.as_str().to_string());
    if claims.email().is_some() && email.is_none() {
        warn!("ignoring email the issuer did not verify");
    }

    let given_name = claims
        .given_name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string());
    let family_name = claims
        .family_name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string());
    let display_name = claims
        .name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string());
    let picture = claims
        .picture()
        .and_then(|p| p.get(None))
        .map(|p| p.as_str().to_string());

    Ok(ExternalProfile {
        external_id: subject,
        emails: email.into_iter().collect(),
        photos: picture.into_iter().collect(),
        given_name,
        family_name,
        display_name,
    })
}
