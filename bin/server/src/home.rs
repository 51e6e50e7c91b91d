//! The home page.
//!
//! Renders the signed-in user and the pending one-shot message as JSON.
//! Reading the page consumes the message.

use axum::{Json, extract::State};
use axum_extra::extract::SignedCookieJar;
use latchkey_identity::{Role, User};
use serde::Serialize;

use crate::auth::{AppState, AuthError, CurrentUser, middleware::session_id};

/// What the home page shows.
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub user: Option<UserView>,
    pub error: Option<String>,
}

/// Public fields of the signed-in user.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub thumbnail: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub blocked: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            email: user.email().to_string(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name().map(str::to_string),
            thumbnail: user.thumbnail().map(str::to_string),
            role: user.role(),
            verified: user.is_verified(),
            blocked: user.is_blocked(),
        }
    }
}

pub async fn home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: SignedCookieJar,
) -> Result<Json<HomeView>, AuthError> {
    let error = match session_id(&jar) {
        Some(id) => state
            .sessions
            .take_flash(id)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?,
        None => None,
    };

    Ok(Json(HomeView {
        user: user.as_ref().map(UserView::from),
        error,
    }))
}
