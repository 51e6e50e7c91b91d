//! Router assembly.

use axum::{
    Router,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use std::path::Path;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{auth, auth::AppState, home};

/// Builds the application router.
///
/// Static files under `public_dir` are served at `/public`. Every response
/// is marked uncacheable, so pages never show a stale sign-in state.
pub fn router(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    let no_cache = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("surrogate-control"),
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/", get(home::home))
        .route("/auth/google/signup", get(auth::signup))
        .route("/auth/google/signup/callback", get(auth::signup_callback))
        .route("/auth/google/login", get(auth::login))
        .route("/auth/google/login/callback", get(auth::login_callback))
        .route("/auth/logout", get(auth::logout))
        .nest_service("/public", ServeDir::new(public_dir))
        .fallback(not_found)
        .layer(no_cache)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use axum_extra::extract::cookie::Key;
    use latchkey_core::{Result, SessionId};
    use latchkey_identity::{
        ExternalProfile, FlowIntent, MemorySessionStore, MemoryUserStore, Session, SessionStore,
        StoreError, User, UserStore,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::auth::{AuthState, IdentityProvider, ProviderError};
    use crate::config::SessionConfig;

    /// Provider that hands out predictable state and maps codes to profiles.
    struct FakeProvider {
        profiles: HashMap<String, ExternalProfile>,
    }

    impl FakeProvider {
        fn csrf(intent: FlowIntent) -> String {
            format!("csrf-{intent}")
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, intent: FlowIntent) -> (String, AuthState) {
            let state = AuthState {
                csrf_token: Self::csrf(intent),
                pkce_verifier: format!("verifier-{intent}"),
                nonce: format!("nonce-{intent}"),
            };
            (
                format!("https://accounts.example.com/auth?flow={intent}"),
                state,
            )
        }

        async fn exchange_code(
            &self,
            intent: FlowIntent,
            code: &str,
            state: &AuthState,
        ) -> Result<ExternalProfile, ProviderError> {
            assert_eq!(state.pkce_verifier, format!("verifier-{intent}"));
            self.profiles.get(code).cloned().ok_or_else(|| {
                ProviderError::TokenExchange(format!("unknown code '{code}'")).into()
            })
        }
    }

    /// Session store whose deletes always fail.
    #[derive(Default)]
    struct BrokenDeleteSessions {
        inner: MemorySessionStore,
    }

    #[async_trait]
    impl SessionStore for BrokenDeleteSessions {
        async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
            self.inner.load(id).await
        }

        async fn save(&self, session: &Session) -> Result<(), StoreError> {
            self.inner.save(session).await
        }

        async fn delete(&self, _id: SessionId) -> Result<(), StoreError> {
            Err(StoreError::Query {
                details: "connection reset".to_string(),
            }
            .into())
        }

        async fn delete_expired(&self) -> Result<u64, StoreError> {
            self.inner.delete_expired().await
        }
    }

    struct Harness {
        app: Router,
        users: Arc<MemoryUserStore>,
    }

    fn profiles() -> HashMap<String, ExternalProfile> {
        let ada = ExternalProfile::new("g-ada", "ada@x.com")
            .with_name(Some("Ada".to_string()), Some("Lovelace".to_string()))
            .with_photo(Some("https://photos/ada".to_string()));
        let grace = ExternalProfile::new("g-grace", "grace@x.com")
            .with_display_name(Some("Grace Hopper".to_string()));
        HashMap::from([("ada".to_string(), ada), ("grace".to_string(), grace)])
    }

    fn harness_with(sessions: Arc<dyn SessionStore>) -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let provider = Arc::new(FakeProvider {
            profiles: profiles(),
        });
        let session_config = SessionConfig {
            secure_cookies: false,
            ..SessionConfig::default()
        };
        let state = AppState::new(
            users.clone(),
            sessions,
            provider,
            session_config,
            Key::generate(),
        );
        Harness {
            app: router(state, "public"),
            users,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemorySessionStore::new()))
    }

    /// Minimal cookie-carrying client.
    #[derive(Default)]
    struct Browser {
        cookies: HashMap<String, String>,
    }

    impl Browser {
        async fn get(&mut self, app: &Router, uri: &str) -> Response<Body> {
            let mut request = Request::builder().uri(uri);
            if !self.cookies.is_empty() {
                let header = self
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                request = request.header(header::COOKIE, header);
            }

            let response = app
                .clone()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();

            for set_cookie in response.headers().get_all(header::SET_COOKIE) {
                let set_cookie = set_cookie.to_str().unwrap();
                let pair = set_cookie.split(';').next().unwrap();
                let (name, value) = pair.split_once('=').unwrap();
                let removed = value.is_empty() || set_cookie.contains("Max-Age=0");
                if removed {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }

            response
        }

        /// Walks through the entry point and the callback for `intent`.
        async fn authenticate(
            &mut self,
            app: &Router,
            intent: FlowIntent,
            code: &str,
        ) -> Response<Body> {
            let start = self.get(app, &format!("/auth/google/{intent}")).await;
            assert_eq!(start.status(), StatusCode::SEE_OTHER);

            let state = FakeProvider::csrf(intent);
            self.get(
                app,
                &format!("/auth/google/{intent}/callback?code={code}&state={state}"),
            )
            .await
        }

        async fn home(&mut self, app: &Router) -> serde_json::Value {
            let response = self.get(app, "/").await;
            assert_eq!(response.status(), StatusCode::OK);
            body_json(response).await
        }
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn entry_point_redirects_to_provider() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser.get(&h.app, "/auth/google/signup").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "https://accounts.example.com/auth?flow=signup"
        );
        assert!(browser.cookies.contains_key("auth_state"));
    }

    #[tokio::test]
    async fn signup_creates_account_and_signs_in() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser.authenticate(&h.app, FlowIntent::Signup, "ada").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert!(browser.cookies.contains_key("session"));
        assert!(!browser.cookies.contains_key("auth_state"));

        let page = browser.home(&h.app).await;
        assert_eq!(page["user"]["email"], "ada@x.com");
        assert_eq!(page["user"]["first_name"], "Ada");
        assert_eq!(page["user"]["verified"], true);
        assert!(page["error"].is_null());

        let users = h.users.all().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].external_id(), Some("g-ada"));
    }

    #[tokio::test]
    async fn repeated_signup_flashes_message_once() {
        let h = harness();
        let mut first = Browser::default();
        first.authenticate(&h.app, FlowIntent::Signup, "ada").await;

        let mut second = Browser::default();
        let response = second.authenticate(&h.app, FlowIntent::Signup, "ada").await;
        assert_eq!(location(&response), "/");

        let page = second.home(&h.app).await;
        assert!(page["user"].is_null());
        assert_eq!(page["error"], "user already exists, please log in");

        let again = second.home(&h.app).await;
        assert!(again["error"].is_null());
        assert_eq!(h.users.all().await.len(), 1);
    }

    #[tokio::test]
    async fn login_after_signup_reuses_account() {
        let h = harness();
        Browser::default()
            .authenticate(&h.app, FlowIntent::Signup, "grace")
            .await;

        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Login, "grace").await;

        let page = browser.home(&h.app).await;
        assert_eq!(page["user"]["email"], "grace@x.com");
        assert_eq!(page["user"]["first_name"], "Grace");
        assert_eq!(h.users.all().await.len(), 1);
    }

    #[tokio::test]
    async fn login_without_account_flashes_message() {
        let h = harness();
        let mut browser = Browser::default();

        browser.authenticate(&h.app, FlowIntent::Login, "ada").await;

        let page = browser.home(&h.app).await;
        assert!(page["user"].is_null());
        assert_eq!(
            page["error"],
            "user does not exist or is blocked, please sign up"
        );
        assert!(h.users.all().await.is_empty());
    }

    #[tokio::test]
    async fn blocked_account_cannot_log_in() {
        let h = harness();
        let mut user = User::from_profile(&profiles()["ada"], "ada@x.com".to_string());
        user.set_blocked(true);
        h.users.insert(&user).await.unwrap();

        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Login, "ada").await;

        let page = browser.home(&h.app).await;
        assert!(page["user"].is_null());
        assert_eq!(
            page["error"],
            "user does not exist or is blocked, please sign up"
        );
    }

    #[tokio::test]
    async fn login_links_existing_unlinked_account() {
        let h = harness();
        let local = User::new("ada@x.com".to_string(), "Augusta".to_string());
        h.users.insert(&local).await.unwrap();

        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Login, "ada").await;

        let page = browser.home(&h.app).await;
        assert_eq!(page["user"]["id"], local.id().to_string());
        assert_eq!(page["user"]["first_name"], "Augusta");
        assert_eq!(page["user"]["thumbnail"], "https://photos/ada");
    }

    #[tokio::test]
    async fn session_id_changes_on_sign_in() {
        let h = harness();
        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Login, "ada").await;
        let anonymous = browser.cookies["session"].clone();

        browser.authenticate(&h.app, FlowIntent::Signup, "ada").await;

        assert_ne!(browser.cookies["session"], anonymous);
        assert_eq!(browser.home(&h.app).await["user"]["email"], "ada@x.com");
    }

    #[tokio::test]
    async fn callback_without_auth_state_is_rejected() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser
            .get(&h.app, "/auth/google/signup/callback?code=ada&state=csrf-signup")
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.users.all().await.is_empty());
    }

    #[tokio::test]
    async fn callback_with_wrong_state_is_rejected() {
        let h = harness();
        let mut browser = Browser::default();
        browser.get(&h.app, "/auth/google/signup").await;

        let response = browser
            .get(&h.app, "/auth/google/signup/callback?code=ada&state=forged")
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_for_other_flow_is_rejected() {
        let h = harness();
        let mut browser = Browser::default();
        browser.get(&h.app, "/auth/google/signup").await;

        let response = browser
            .get(&h.app, "/auth/google/login/callback?code=ada&state=csrf-signup")
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forged_auth_state_cookie_is_rejected() {
        let h = harness();
        let mut browser = Browser::default();
        browser.cookies.insert(
            "auth_state".to_string(),
            r#"{"intent":"signup","csrf_token":"csrf-signup","pkce_verifier":"v","nonce":"n"}"#
                .to_string(),
        );

        let response = browser
            .get(&h.app, "/auth/google/signup/callback?code=ada&state=csrf-signup")
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancelled_consent_flashes_message() {
        let h = harness();
        let mut browser = Browser::default();
        browser.get(&h.app, "/auth/google/login").await;

        let response = browser
            .get(
                &h.app,
                "/auth/google/login/callback?error=access_denied&state=csrf-login",
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let page = browser.home(&h.app).await;
        assert_eq!(page["error"], "sign-in with Google was cancelled");
    }

    #[tokio::test]
    async fn cancellation_without_started_flow_writes_nothing() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser
            .get(&h.app, "/auth/google/login/callback?error=access_denied")
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // A started flow with a forged state is refused the same way.
        browser.get(&h.app, "/auth/google/login").await;
        let response = browser
            .get(
                &h.app,
                "/auth/google/login/callback?error=access_denied&state=forged",
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = browser.home(&h.app).await;
        assert!(page["error"].is_null());
    }

    #[tokio::test]
    async fn other_provider_errors_are_fatal() {
        let h = harness();
        let mut browser = Browser::default();
        browser.get(&h.app, "/auth/google/login").await;

        let response = browser
            .get(
                &h.app,
                "/auth/google/login/callback?error=server_error&error_description=boom&state=csrf-login",
            )
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn failed_code_exchange_is_fatal() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser
            .authenticate(&h.app, FlowIntent::Signup, "unknown")
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.users.all().await.is_empty());
    }

    #[tokio::test]
    async fn logout_ends_session_and_is_repeatable() {
        let h = harness();
        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Signup, "ada").await;
        let stolen = browser.cookies["session"].clone();

        let response = browser.get(&h.app, "/auth/logout").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert!(!browser.cookies.contains_key("session"));
        assert!(browser.home(&h.app).await["user"].is_null());

        let again = browser.get(&h.app, "/auth/logout").await;
        assert_eq!(again.status(), StatusCode::SEE_OTHER);

        // The old cookie no longer resolves to a session.
        let mut replay = Browser::default();
        replay.cookies.insert("session".to_string(), stolen);
        assert!(replay.home(&h.app).await["user"].is_null());
    }

    #[tokio::test]
    async fn logout_store_failure_is_generic_error() {
        let h = harness_with(Arc::new(BrokenDeleteSessions::default()));
        let mut browser = Browser::default();
        browser.authenticate(&h.app, FlowIntent::Signup, "ada").await;
        assert!(browser.cookies.contains_key("session"));

        let response = browser.get(&h.app, "/auth/logout").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!browser.cookies.contains_key("session"));
    }

    #[tokio::test]
    async fn tampered_session_cookie_is_ignored() {
        let h = harness();
        let mut browser = Browser::default();
        browser
            .cookies
            .insert("session".to_string(), SessionId::new().to_string());

        let page = browser.home(&h.app).await;

        assert!(page["user"].is_null());
        assert!(page["error"].is_null());
    }

    #[tokio::test]
    async fn responses_are_not_cacheable() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser.get(&h.app, "/").await;

        let headers = response.headers();
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate, proxy-revalidate"
        );
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
        assert_eq!(headers["surrogate-control"], "no-store");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let h = harness();
        let mut browser = Browser::default();

        let response = browser.get(&h.app, "/nope").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    }
}
