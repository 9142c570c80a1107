//! In-process session context for UI shells.
//!
//! Mirrors the backend session for interactive consumers: login/signup/
//! logout calls, the current user profile, and focus-driven re-validation.
//! The backend sets and clears the session cookies itself; this client only
//! carries them (cookie store) and tracks the resulting user state. All
//! session-state mutation flows through the operations here.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// User profile as returned by the backend's identity endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    #[serde(default)]
    pub last_login_at: Option<String>,
    #[serde(default)]
    pub login_count: u64,
    pub created_at: String,
}

/// Session state owned by the context. `loading` starts true and resolves
/// after the first identity fetch.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Errors surfaced by the mutation operations. Identity fetches never error:
/// an unauthenticated visitor is a steady state, not an exception.
#[derive(Debug)]
pub enum AuthError {
    /// Rejected locally before any network call.
    Validation(String),
    /// Non-2xx from the backend, carrying its message when available.
    Backend(String),
    /// The request never completed.
    Network(reqwest::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Validation(msg) | AuthError::Backend(msg) => write!(f, "{}", msg),
            AuthError::Network(e) => write!(f, "Request failed: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

/// Backend endpoint set consumed by the context.
#[derive(Debug, Clone)]
struct AuthEndpoints {
    auth_base: String,
    users_base: String,
}

impl AuthEndpoints {
    fn new(backend_base: &Url) -> Self {
        let base = backend_base.as_str().trim_end_matches('/');
        Self {
            auth_base: format!("{}/api/auth", base),
            users_base: format!("{}/api/users", base),
        }
    }

    fn auth(&self, op: &str) -> String {
        format!("{}/{}", self.auth_base, op)
    }

    fn me(&self) -> String {
        format!("{}/me", self.users_base)
    }
}

/// Client-side auth context.
///
/// Designed for a single UI event loop: session state sits behind a mutex
/// that is never held across an await, and the identity refresh is
/// single-flight via an atomic flag set before the first suspension point.
pub struct AuthContext {
    http: reqwest::Client,
    endpoints: AuthEndpoints,
    state: Mutex<SessionState>,
    refreshing: AtomicBool,
}

impl AuthContext {
    /// Build a context against the backend base URL
    /// (e.g. `http://localhost:8000`).
    pub fn new(backend_base: &Url) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build auth HTTP client");
        Self {
            http,
            endpoints: AuthEndpoints::new(backend_base),
            state: Mutex::new(SessionState {
                user: None,
                loading: true,
                error: None,
            }),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.lock().expect("session state poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().user.is_some()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state().user
    }

    pub fn clear_error(&self) {
        self.with_state(|s| s.error = None);
    }

    fn with_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.lock().expect("session state poisoned");
        f(&mut state);
    }

    /// Mount-time initialization: one identity fetch, then the loading flag
    /// resolves whatever the outcome.
    pub async fn initialize(&self) {
        self.refresh_user().await;
        self.with_state(|s| s.loading = false);
    }

    /// Window-focus re-validation: if no user is loaded and nothing is in
    /// flight, re-attempt the identity fetch. Covers a session renewed or
    /// cleared in another tab.
    pub async fn handle_window_focus(&self) {
        let state = self.state();
        if state.user.is_none() && !state.loading {
            self.refresh_user().await;
        }
    }

    /// Fetch the current user from the backend and update session state.
    ///
    /// Single-flight: a second call while one is outstanding returns
    /// immediately instead of firing a duplicate request. Several mount-time
    /// effects (initial load, focus listener) can all want this at once.
    pub async fn refresh_user(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let fetched = match self.http.get(self.endpoints.me()).send().await {
            Ok(response) if response.status().is_success() => {
                response.json::<UserProfile>().await.ok()
            }
            Ok(response) => {
                debug!(status = %response.status(), "Identity fetch returned no session");
                None
            }
            Err(e) => {
                debug!(error = %e, "Identity fetch failed");
                None
            }
        };
        self.with_state(|s| s.user = fetched);

        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// Log in with email and password. Validates locally before any network
    /// call; the backend sets the session cookies on success.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<UserProfile, AuthError> {
        validate_email(email).map_err(|e| self.record(e))?;
        validate_password(password, "Password").map_err(|e| self.record(e))?;
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });

        // OAuth2-style form encoding, as the backend expects.
        let mut form = vec![("username", email), ("password", password)];
        if remember_me {
            form.push(("rememberMe", "true"));
        }

        let result = async {
            let response = self
                .http
                .post(self.endpoints.auth("login"))
                .form(&form)
                .send()
                .await
                .map_err(AuthError::Network)?;
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            if !status.is_success() {
                return Err(AuthError::Backend(backend_message(&body, "Login failed")));
            }
            serde_json::from_value::<UserProfile>(body.get("user").cloned().unwrap_or(Value::Null))
                .map_err(|_| AuthError::Backend("Login failed".to_string()))
        }
        .await;

        match result {
            Ok(user) => {
                self.with_state(|s| {
                    s.user = Some(user.clone());
                    s.loading = false;
                });
                Ok(user)
            }
            Err(e) => Err(self.finish_with(e)),
        }
    }

    /// Register a new account. The backend may require email verification
    /// before a session exists; the user slot is only set when the response
    /// carries a profile.
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<(), AuthError> {
        if name.trim().is_empty() {
            return Err(self.record(AuthError::Validation("Name is required".to_string())));
        }
        validate_email(email).map_err(|e| self.record(e))?;
        validate_password(password, "Password").map_err(|e| self.record(e))?;
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });

        let body = serde_json::json!({ "email": email, "password": password, "name": name });
        let result = self
            .post_json(self.endpoints.auth("register"), &body, "Registration failed")
            .await;

        match result {
            Ok(response_body) => {
                let user = response_body
                    .get("user")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<UserProfile>(v).ok());
                self.with_state(|s| {
                    if user.is_some() {
                        s.user = user;
                    }
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => Err(self.finish_with(e)),
        }
    }

    /// Log out of the current session. Local state is cleared even when the
    /// backend call fails; the UI must never stay "logged in" against a
    /// dead backend.
    pub async fn logout(&self) {
        let _ = self.http.post(self.endpoints.auth("logout")).send().await;
        self.with_state(|s| {
            s.user = None;
            s.error = None;
            s.loading = false;
        });
    }

    /// Log out every session for this account. Same optimistic local
    /// clearing as [`logout`](Self::logout).
    pub async fn logout_all(&self) {
        let _ = self
            .http
            .post(self.endpoints.auth("logout-all"))
            .send()
            .await;
        self.with_state(|s| {
            s.user = None;
            s.error = None;
            s.loading = false;
        });
    }

    /// Explicitly exchange the refresh cookie for a new access cookie, then
    /// re-fetch the user.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoints.auth("refresh"))
            .send()
            .await
            .map_err(|e| {
                self.with_state(|s| s.user = None);
                AuthError::Network(e)
            })?;
        if !response.status().is_success() {
            self.with_state(|s| s.user = None);
            return Err(AuthError::Backend("Token refresh failed".to_string()));
        }
        self.refresh_user().await;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });
        let body = serde_json::json!({ "email": email });
        self.mutation(
            self.endpoints.auth("forgot-password"),
            &body,
            "Failed to send reset email",
        )
        .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password, "Password").map_err(|e| self.record(e))?;
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });
        let body = serde_json::json!({ "token": token, "newPassword": new_password });
        self.mutation(
            self.endpoints.auth("reset-password"),
            &body,
            "Failed to reset password",
        )
        .await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password, "New password").map_err(|e| self.record(e))?;
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });
        let body = serde_json::json!({
            "currentPassword": current_password,
            "newPassword": new_password,
        });
        self.mutation(
            self.endpoints.auth("change-password"),
            &body,
            "Failed to change password",
        )
        .await
    }

    /// Re-send the verification email for the signed-in account.
    pub async fn resend_verification_email(&self) -> Result<(), AuthError> {
        let Some(email) = self.current_user().map(|u| u.email) else {
            return Err(self.record(AuthError::Validation(
                "No email address found".to_string(),
            )));
        };
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });
        let body = serde_json::json!({ "email": email });
        self.mutation(
            self.endpoints.auth("resend-verification"),
            &body,
            "Failed to resend verification email",
        )
        .await
    }

    /// Confirm an emailed verification token. Does not establish a session;
    /// the account still signs in afterwards.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        self.with_state(|s| {
            s.loading = true;
            s.error = None;
        });
        let body = serde_json::json!({ "token": token });
        self.mutation(
            self.endpoints.auth("verify-email"),
            &body,
            "Email verification failed",
        )
        .await
    }

    /// Shared body for mutations with no interesting response payload.
    async fn mutation(
        &self,
        url: String,
        body: &Value,
        default_error: &str,
    ) -> Result<(), AuthError> {
        match self.post_json(url, body, default_error).await {
            Ok(_) => {
                self.with_state(|s| s.loading = false);
                Ok(())
            }
            Err(e) => Err(self.finish_with(e)),
        }
    }

    async fn post_json(
        &self,
        url: String,
        body: &Value,
        default_error: &str,
    ) -> Result<Value, AuthError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(AuthError::Network)?;
        let status = response.status();
        let response_body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(AuthError::Backend(backend_message(
                &response_body,
                default_error,
            )));
        }
        Ok(response_body)
    }

    /// Record a failure into session state without touching the loading flag.
    fn record(&self, error: AuthError) -> AuthError {
        self.with_state(|s| s.error = Some(error.to_string()));
        error
    }

    /// Record a failure and resolve the loading flag.
    fn finish_with(&self, error: AuthError) -> AuthError {
        self.with_state(|s| {
            s.error = Some(error.to_string());
            s.loading = false;
        });
        error
    }
}

/// Extract the backend's error message from a response body, falling back to
/// a generic string.
fn backend_message(body: &Value, default: &str) -> String {
    for field in ["detail", "message", "error"] {
        if let Some(message) = body.get(field).and_then(Value::as_str) {
            return message.to_string();
        }
    }
    default.to_string()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !email.contains('@') {
        return Err(AuthError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str, field: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::Validation(format!(
            "{} must be at least 8 characters long",
            field
        )));
    }
    Ok(())
}
