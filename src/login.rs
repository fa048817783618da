#![cfg(feature = "web")]

use crate::app::{AppState, render_page};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::FlashQuery;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Access code form data
#[derive(Debug, Deserialize)]
pub struct AccessCodeForm {
    #[serde(default)]
    pub code: String,
}

/// Proof that the request carries a valid session
///
/// Inserted into the request extensions by [`require_auth`]; protected
/// handlers take it as `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub session_id: String,
    pub expires_at: SystemTime,
}

/// Active sessions, owned by the application state
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SystemTime>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and drop any that have expired
    pub fn create(&self) -> AuthContext {
        let session_id = Uuid::new_v4().to_string();
        let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = SystemTime::now();
        sessions.retain(|_, expiry| *expiry > now);
        sessions.insert(session_id.clone(), expires_at);

        AuthContext {
            session_id,
            expires_at,
        }
    }

    /// Look up a session that has not yet expired
    pub fn validate(&self, session_id: &str) -> Option<AuthContext> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        match sessions.get(session_id) {
            Some(expires_at) if *expires_at > SystemTime::now() => Some(AuthContext {
                session_id: session_id.to_string(),
                expires_at: *expires_at,
            }),
            _ => None,
        }
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash an access code using Argon2
///
/// # Returns
/// * `Result<String, String>` - The PHC-format hash or an error
///
/// # Examples
/// ```
/// use artist_splitter::login::{hash_access_code, verify_access_code};
///
/// let hash = hash_access_code("open sesame").unwrap();
/// assert!(verify_access_code("open sesame", &hash));
/// assert!(!verify_access_code("open barley", &hash));
/// ```
pub fn hash_access_code(code: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(code.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Check a submitted access code against the configured hash
pub fn verify_access_code(code: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(code.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Whether `value` is a PHC string that can be used as the access code hash
pub fn is_access_code_hash(value: &str) -> bool {
    PasswordHash::new(value).is_ok()
}

/// Serve the login page
pub async fn serve_login_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_page(&state, "login", &flash)
}

/// Handle access code submissions
///
/// A matching code starts a session and redirects home; anything else
/// redirects back to the login page with a message.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<AccessCodeForm>,
) -> Response {
    if form.code.trim().is_empty() {
        return Redirect::to("/login?error=Please+enter+the+access+code.").into_response();
    }

    if !verify_access_code(form.code.trim(), &state.config.access_code_hash) {
        log::warn!("rejected login attempt with an invalid access code");
        return Redirect::to("/login?error=Invalid+access+code.").into_response();
    }

    let auth = state.sessions.create();
    log::info!("session started, {} active", state.sessions.len());

    let cookie = Cookie::build((SESSION_COOKIE, auth.session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    (jar.add(cookie), Redirect::to("/")).into_response()
}

/// Handle logout
///
/// Forgets the session and clears the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login")).into_response()
}

/// Authentication middleware
///
/// Passes the request on with an [`AuthContext`] in its extensions when the
/// session cookie is valid. Otherwise pages redirect to `/login` and API
/// calls get `401`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(auth) = state.sessions.validate(session_cookie.value()) {
            request.extensions_mut().insert(auth);
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "status": "error",
                "message": "Not logged in",
            })),
        )
            .into_response();
    }

    Redirect::to("/login").into_response()
}
