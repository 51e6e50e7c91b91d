//! Authentication routes for signup, login, their callbacks, and logout.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use latchkey_core::SessionId;
use latchkey_identity::{FlowIntent, LinkOutcome, Session};
use serde::{Deserialize, Serialize};
use time::Duration as TimeDuration;
use tracing::{info, warn};

use super::{
    AppState,
    middleware::{SESSION_COOKIE, session_id},
    provider::AuthState,
};

/// Auth state cookie name (for CSRF protection during OIDC flow).
const AUTH_STATE_COOKIE: &str = "auth_state";

/// Error code the provider sends when the user declines consent.
const ACCESS_DENIED: &str = "access_denied";

/// Shown when the user cancels at the provider.
const ACCESS_DENIED_MESSAGE: &str = "sign-in with Google was cancelled";

/// Query parameters for the OIDC callback.
///
/// The provider sends either `code` and `state`, or `error`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Starts the signup flow.
pub async fn signup(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    start(&state, jar, FlowIntent::Signup)
}

/// Starts the login flow.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    start(&state, jar, FlowIntent::Login)
}

/// Completes the signup flow.
pub async fn signup_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> Result<Response, AuthError> {
    callback(&state, query, jar, FlowIntent::Signup).await
}

/// Completes the login flow.
pub async fn login_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> Result<Response, AuthError> {
    callback(&state, query, jar, FlowIntent::Login).await
}

/// Redirects to the identity provider, remembering the auth state in a
/// short-lived signed cookie.
fn start(
    state: &AppState,
    jar: SignedCookieJar,
    intent: FlowIntent,
) -> Result<(SignedCookieJar, Redirect), AuthError> {
    let (auth_url, auth_state) = state.provider.authorization_url(intent);

    let auth_state_json = serde_json::to_string(&AuthStateData {
        intent,
        csrf_token: auth_state.csrf_token,
        pkce_verifier: auth_state.pkce_verifier,
        nonce: auth_state.nonce,
    })
    .map_err(|e| AuthError::Internal(format!("failed to serialize auth state: {e}")))?;

    let cookie = Cookie::build((AUTH_STATE_COOKIE, auth_state_json))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10));

    Ok((jar.add(cookie), Redirect::to(&auth_url)))
}

async fn callback(
    state: &AppState,
    query: CallbackQuery,
    jar: SignedCookieJar,
    intent: FlowIntent,
) -> Result<Response, AuthError> {
    let previous = session_id(&jar);

    // Retrieve and validate auth state from cookie. Error responses carry
    // the state too, so nothing is written before this passes.
    let auth_state_cookie = jar
        .get(AUTH_STATE_COOKIE)
        .ok_or(AuthError::MissingAuthState)?;

    let auth_state_data: AuthStateData =
        serde_json::from_str(auth_state_cookie.value()).map_err(|_| AuthError::InvalidAuthState)?;

    if auth_state_data.intent != intent {
        return Err(AuthError::IntentMismatch);
    }

    if query.state.as_deref() != Some(auth_state_data.csrf_token.as_str()) {
        return Err(AuthError::CsrfMismatch);
    }

    if let Some(error) = query.error {
        if error == ACCESS_DENIED {
            info!(intent = %intent, "user cancelled at the identity provider");
            let session = state
                .sessions
                .flash(previous, ACCESS_DENIED_MESSAGE)
                .await
                .map_err(|e| AuthError::Session(e.to_string()))?;
            return Ok(finish(state, jar, &session));
        }
        return Err(AuthError::Provider(format!(
            "{error}: {}",
            query.error_description.unwrap_or_default()
        )));
    }

    let code = query.code.ok_or(AuthError::MissingCode)?;

    let auth_state = AuthState {
        csrf_token: auth_state_data.csrf_token,
        pkce_verifier: auth_state_data.pkce_verifier,
        nonce: auth_state_data.nonce,
    };

    let profile = state
        .provider
        .exchange_code(intent, &code, &auth_state)
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let outcome = state
        .linker
        .resolve(intent, &profile)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    let session = match outcome {
        LinkOutcome::Authenticated { user, .. } => state.sessions.establish(previous, &user).await,
        LinkOutcome::Rejected(failure) => state.sessions.flash(previous, failure.message()).await,
    }
    .map_err(|e| AuthError::Session(e.to_string()))?;

    Ok(finish(state, jar, &session))
}

/// Points the browser at `session`, drops the auth state, and goes home.
fn finish(state: &AppState, jar: SignedCookieJar, session: &Session) -> Response {
    let jar = jar
        .remove(removal(AUTH_STATE_COOKIE))
        .add(session_cookie(state, session.id()));

    (jar, Redirect::to("/")).into_response()
}

/// Logs the user out by deleting their session.
///
/// The session cookie is removed even when the store fails.
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let current = session_id(&jar);
    let jar = jar.remove(removal(SESSION_COOKIE));

    let Some(id) = current else {
        return (jar, Redirect::to("/")).into_response();
    };

    match state.sessions.destroy(id).await {
        Ok(()) => (jar, Redirect::to("/")).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to end session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                jar,
                "Internal server error",
            )
                .into_response()
        }
    }
}

fn session_cookie(state: &AppState, id: SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(state.session_config.cookie_max_age())
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Serializable auth state for cookie storage.
#[derive(Debug, Serialize, Deserialize)]
struct AuthStateData {
    intent: FlowIntent,
    csrf_token: String,
    pkce_verifier: String,
    nonce: String,
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    MissingAuthState,
    InvalidAuthState,
    CsrfMismatch,
    /// The callback belongs to a different flow than the one started.
    IntentMismatch,
    MissingCode,
    /// The provider reported an error other than a cancelled consent.
    Provider(String),
    TokenExchange(String),
    Database(String),
    Session(String),
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingAuthState => (StatusCode::BAD_REQUEST, "Missing auth state"),
            Self::InvalidAuthState => (StatusCode::BAD_REQUEST, "Invalid auth state"),
            Self::CsrfMismatch => (StatusCode::BAD_REQUEST, "CSRF token mismatch"),
            Self::IntentMismatch => (StatusCode::BAD_REQUEST, "Auth flow mismatch"),
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::Provider(msg) => {
                warn!(error = %msg, "identity provider reported an error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
            }
            Self::TokenExchange(msg) => {
                tracing::error!(error = %msg, "token exchange failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
            }
            Self::Database(msg) => {
                tracing::error!(error = %msg, "user store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Session(msg) => {
                tracing::error!(error = %msg, "session store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
