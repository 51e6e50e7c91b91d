//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{SignedCookieJar, cookie::Key};
use latchkey_core::SessionId;
use latchkey_identity::User;

use super::AppState;

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session";

/// Reads the session id from the signed session cookie.
///
/// Cookies with a bad signature never reach here; a value that is not a
/// session id is treated as no session.
pub(crate) fn session_id(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse().ok())
}

/// Extractor for the signed-in user, if any.
///
/// The user is re-read from the store on every request, so changes to the
/// account show up on the next request.
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(jar) = SignedCookieJar::<Key>::from_request_parts(parts, state).await;

        let Some(session_id) = session_id(&jar) else {
            return Ok(CurrentUser(None));
        };

        let user = app_state
            .sessions
            .current_user(session_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to load session user");
                AuthRejection::InternalError
            })?;

        Ok(CurrentUser(user))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
