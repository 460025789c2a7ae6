//! Authentication orchestrator.
//!
//! [`AuthService`] owns the session: it is the only writer of the
//! [`TokenStore`], the only owner of the [`RefreshScheduler`], and the only
//! publisher of the current user. Ordering rules:
//! - persist storage before arming the scheduler
//! - cancel the scheduler before clearing storage
//!
//! Failures from the network are classified once, here, into [`AuthError`].

use super::activity::ActivityMonitor;
use super::error::AuthError;
use super::scheduler::RefreshScheduler;
use super::store::TokenStore;
use super::token::TokenValidator;
use super::types::{
    AuthResponse, LogoutReason, ProfileResponse, ProfileUpdate, RegistrationProfile,
    SessionEvent, UserSnapshot,
};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::net::{
    AlwaysOnline, ApiRequest, ConnectivityProbe, Method, StatusClass, Transport, TransportError,
};
use crate::security::{find_injection, find_secret_injection, sanitize, RateLimiter};
use crate::storage::{KeyValueStore, MemoryStore};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/auth/profile";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Rate-limited action names.
pub const LOGIN_ACTION: &str = "login";
pub const PASSWORD_RESET_ACTION: &str = "password_reset";

const EVENT_CAPACITY: usize = 16;

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The server issued a token; the user is signed in.
    SignedIn(UserSnapshot),
    /// Account created; the user still has to sign in (e.g. after email verification).
    PendingLogin,
}

struct Inner {
    config: AuthConfig,
    transport: Arc<dyn Transport>,
    probe: Arc<dyn ConnectivityProbe>,
    store: TokenStore,
    limiter: RateLimiter,
    validator: TokenValidator,
    activity: ActivityMonitor,
    scheduler: RefreshScheduler,
    /// Serialises refreshes so concurrent callers share one request.
    refresh_guard: tokio::sync::Mutex<()>,
    /// Bumped whenever the stored tokens change or the session ends.
    generation: AtomicU64,
    /// Error of the refresh that last ended the session, with the
    /// generation it left behind.
    last_refresh_failure: Mutex<Option<(u64, AuthError)>>,
    user_tx: watch::Sender<Option<UserSnapshot>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Builder for [`AuthService`].
pub struct AuthServiceBuilder {
    config: AuthConfig,
    transport: Arc<dyn Transport>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl AuthServiceBuilder {
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<AuthService, AuthError> {
        self.config
            .validate()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let probe = self.probe.unwrap_or_else(|| Arc::new(AlwaysOnline));
        let namespace = self.config.storage_namespace.clone();

        let store = TokenStore::new(storage.clone(), &namespace);
        let limiter = RateLimiter::new(
            storage,
            clock.clone(),
            &namespace,
            self.config.login_attempt_window_ms,
        );
        let activity = ActivityMonitor::new(
            store.clone(),
            clock.clone(),
            self.config.session_idle_timeout_secs,
        );
        let scheduler = RefreshScheduler::new(clock.clone(), self.config.refresh_skew_secs);
        let (user_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(AuthService {
            inner: Arc::new(Inner {
                config: self.config,
                transport: self.transport,
                probe,
                store,
                limiter,
                validator: TokenValidator::new(clock),
                activity,
                scheduler,
                refresh_guard: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                last_refresh_failure: Mutex::new(None),
                user_tx,
                events,
            }),
        })
    }
}

/// Client-side session manager. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    pub fn builder(config: AuthConfig, transport: Arc<dyn Transport>) -> AuthServiceBuilder {
        AuthServiceBuilder {
            config,
            transport,
            storage: None,
            clock: None,
            probe: None,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// True iff a whole session is stored, its token is unexpired and it
    /// has not been idle past the timeout. Never mutates state.
    pub fn is_authenticated(&self) -> bool {
        let Some(record) = self.inner.store.load() else {
            return false;
        };
        self.inner.validator.is_valid(&record.access_token) && !self.inner.activity.is_expired()
    }

    /// The cached user of the stored session.
    pub fn current_user(&self) -> Option<UserSnapshot> {
        self.inner.store.load().map(|record| record.user)
    }

    /// Observe the signed-in user. `None` while signed out.
    pub fn subscribe_user(&self) -> watch::Receiver<Option<UserSnapshot>> {
        self.inner.user_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a proactive refresh is currently armed.
    pub fn is_refresh_scheduled(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    // ── Login / registration ────────────────────────────────────────

    /// Sign in with an identifier (email) and password.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<UserSnapshot, AuthError> {
        let inner = &self.inner;
        let window_ms = inner.config.login_attempt_window_ms;
        if !inner
            .limiter
            .is_allowed(LOGIN_ACTION, inner.config.max_login_attempts, window_ms)
        {
            let retry_after_ms = inner.limiter.retry_after_ms(LOGIN_ACTION, window_ms);
            tracing::warn!("Login blocked by rate limiter");
            return Err(AuthError::TooManyAttempts {
                retry_after_secs: retry_after_ms.div_ceil(1000),
            });
        }

        let identifier = clean("email", identifier)?;
        screen_secret("password", password)?;

        tracing::debug!(identifier = %identifier, "Submitting login");
        let body = json!({ "email": identifier, "password": password });
        match inner.transport.post(LOGIN_PATH, body, None).await {
            Ok(body) => {
                let user = self.establish_session(body)?;
                inner.limiter.clear(LOGIN_ACTION);
                tracing::info!(user_id = %user.id, "Login succeeded");
                self.emit(SessionEvent::LoggedIn {
                    user_id: user.id.clone(),
                });
                Ok(user)
            }
            Err(e) => {
                inner.limiter.record_attempt(LOGIN_ACTION);
                let err = self.classify(&e);
                tracing::info!(identifier = %identifier, "Login failed: {err}");
                Err(err)
            }
        }
    }

    /// Create an account. Signs in directly when the server issues a token.
    pub async fn register(
        &self,
        profile: &RegistrationProfile,
        password: &str,
    ) -> Result<RegistrationOutcome, AuthError> {
        let profile = RegistrationProfile {
            email: clean("email", &profile.email)?,
            first_name: clean("first name", &profile.first_name)?,
            last_name: clean("last name", &profile.last_name)?,
            phone: clean_opt("phone", profile.phone.as_deref())?,
        };
        screen_secret("password", password)?;

        let mut body = serde_json::to_value(&profile)
            .map_err(|e| AuthError::Unknown(format!("Failed to encode registration: {e}")))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("password".into(), JsonValue::String(password.to_string()));
        }

        tracing::debug!(email = %profile.email, "Submitting registration");
        let body = self
            .inner
            .transport
            .post(REGISTER_PATH, body, None)
            .await
            .map_err(|e| self.classify(&e))?;

        if !carries_token(&body) {
            tracing::info!(email = %profile.email, "Registered, sign-in required");
            return Ok(RegistrationOutcome::PendingLogin);
        }

        let user = self.establish_session(body)?;
        tracing::info!(user_id = %user.id, "Registered and signed in");
        self.emit(SessionEvent::Registered {
            user_id: user.id.clone(),
        });
        Ok(RegistrationOutcome::SignedIn(user))
    }

    /// Persist a login/registration response, arm the refresh timer and
    /// publish the user.
    fn establish_session(&self, body: JsonValue) -> Result<UserSnapshot, AuthError> {
        let response: AuthResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Unknown(format!("Unexpected auth response: {e}")))?;
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Unknown("Auth response did not include a token".into()))?;
        let user = response
            .user
            .ok_or_else(|| AuthError::Unknown("Auth response did not include a user".into()))?;

        let inner = &self.inner;
        inner
            .store
            .save_session(&token, response.refresh_token.as_deref(), &user)
            .map_err(AuthError::storage)?;
        inner.activity.touch().map_err(AuthError::storage)?;
        inner.generation.fetch_add(1, Ordering::SeqCst);

        self.arm_refresh(&token);
        inner.user_tx.send_replace(Some(user.clone()));
        Ok(user)
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Exchange the stored refresh token for a new access token.
    ///
    /// A missing refresh token or any failure ends the session; there is
    /// no retry. Concurrent calls share one request.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        let inner = &self.inner;
        let seen = inner.generation.load(Ordering::SeqCst);
        let _guard = inner.refresh_guard.lock().await;

        let started = inner.generation.load(Ordering::SeqCst);
        if started != seen {
            if inner.store.access_token().is_some() {
                tracing::debug!("Token already refreshed by a concurrent caller");
                return Ok(());
            }
            return Err(self.ended_session_error(started));
        }

        let Some(refresh_token) = inner.store.refresh_token() else {
            if !inner.store.has_any() {
                return Err(AuthError::NotSignedIn);
            }
            tracing::warn!("No refresh token stored, ending session");
            self.destroy(LogoutReason::NoRefreshToken);
            return Err(AuthError::NoRefreshToken);
        };

        let body = json!({ "refresh_token": refresh_token });
        let result = inner.transport.post(REFRESH_PATH, body, None).await;

        // Logout or a new login while the request was out owns the session now.
        if inner.generation.load(Ordering::SeqCst) != started {
            tracing::info!("Session changed during refresh, discarding the response");
            return match result {
                Ok(_) => Err(AuthError::NotSignedIn),
                Err(e) => Err(self.classify(&e)),
            };
        }

        let response = match result {
            Ok(body) => serde_json::from_value::<AuthResponse>(body)
                .ok()
                .and_then(|r| r.token.filter(|t| !t.is_empty()).map(|t| (t, r.refresh_token))),
            Err(e) => {
                let err = self.classify(&e);
                tracing::warn!("Token refresh failed, ending session: {err}");
                self.fail_refresh(err.clone());
                return Err(err);
            }
        };

        let Some((access_token, rotated)) = response else {
            tracing::warn!("Refresh response had no token, ending session");
            let err = AuthError::Unknown("Refresh response did not include a token".into());
            self.fail_refresh(err.clone());
            return Err(err);
        };

        if let Err(e) = inner.store.replace_tokens(&access_token, rotated.as_deref()) {
            let err = AuthError::storage(e);
            self.fail_refresh(err.clone());
            return Err(err);
        }
        inner.generation.fetch_add(1, Ordering::SeqCst);
        self.arm_refresh(&access_token);

        tracing::debug!("Access token refreshed");
        self.emit(SessionEvent::Refreshed);
        Ok(())
    }

    /// End the session after a failed refresh and remember why, so callers
    /// that queued behind this refresh report the same error.
    fn fail_refresh(&self, err: AuthError) {
        self.destroy(LogoutReason::RefreshFailed);
        let generation = self.inner.generation.load(Ordering::SeqCst);
        *self.inner.last_refresh_failure.lock() = Some((generation, err));
    }

    /// Error for a caller that waited on a refresh which ended the session.
    fn ended_session_error(&self, generation: u64) -> AuthError {
        match &*self.inner.last_refresh_failure.lock() {
            Some((failed_at, err)) if *failed_at == generation => err.clone(),
            _ => AuthError::NotSignedIn,
        }
    }

    /// Arm the proactive refresh for `token`. Returns whether a timer was armed.
    fn arm_refresh(&self, token: &str) -> bool {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .scheduler
            .schedule(token, move || scheduled_refresh(weak))
    }

    /// A usable access token, refreshing first when the stored one is
    /// missing, expired or inside the refresh skew.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let inner = &self.inner;
        let skew_ms = i64::try_from(inner.config.refresh_skew_secs.saturating_mul(1000))
            .unwrap_or(i64::MAX);

        if let Some(token) = inner.store.access_token() {
            if inner
                .validator
                .remaining_ms(&token)
                .is_some_and(|remaining| remaining > skew_ms)
            {
                return Ok(token);
            }
        } else if !inner.store.has_any() {
            return Err(AuthError::NotSignedIn);
        }

        self.refresh_token().await?;
        inner.store.access_token().ok_or(AuthError::NotSignedIn)
    }

    /// Send an authenticated request. A 401 means the server no longer
    /// trusts the token: the session is destroyed.
    pub async fn authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue, AuthError> {
        let token = self.access_token().await?;
        let mut request = ApiRequest::new(method, path).with_bearer(Some(&token));
        if let Some(body) = body {
            request = request.with_body(body);
        }

        match self.inner.transport.send(request).await {
            Ok(body) => Ok(body),
            Err(e) if e.class == StatusClass::Unauthorized => {
                tracing::warn!(path, "Server rejected the session token, ending session");
                self.destroy(LogoutReason::Unauthorized);
                Err(AuthError::CredentialsRejected)
            }
            Err(e) => Err(self.classify(&e)),
        }
    }

    // ── Logout ──────────────────────────────────────────────────────

    /// End the session locally. A manual logout also tells the server,
    /// best effort; its outcome is never reported. The returned handle
    /// lets a short-lived caller wait for that notification to go out.
    pub fn logout(&self, manual: bool) -> Option<JoinHandle<()>> {
        let access_token = self.inner.store.access_token();
        let refresh_token = self.inner.store.refresh_token();

        self.destroy(if manual {
            LogoutReason::Manual
        } else {
            LogoutReason::Expired
        });

        if !manual {
            return None;
        }
        let access_token = access_token?;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime, skipping server logout notification");
            return None;
        };

        let transport = Arc::clone(&self.inner.transport);
        Some(runtime.spawn(async move {
            let body = json!({ "refresh_token": refresh_token });
            if let Err(e) = transport.post(LOGOUT_PATH, body, Some(&access_token)).await {
                tracing::warn!("Server logout notification failed: {e}");
            }
        }))
    }

    /// Cancel the timer, clear storage, publish the signed-out state.
    fn destroy(&self, reason: LogoutReason) {
        let inner = &self.inner;
        inner.scheduler.cancel();
        let had_session = inner.store.has_any();
        if let Err(e) = inner.store.clear() {
            tracing::warn!("Failed to clear stored session: {e}");
        }
        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.user_tx.send_replace(None);
        if had_session {
            tracing::info!(reason = ?reason, "Session ended");
            self.emit(SessionEvent::LoggedOut { reason });
        }
    }

    // ── Profile ─────────────────────────────────────────────────────

    /// Update profile fields. Only the cached user changes; tokens and the
    /// refresh timer are left alone.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserSnapshot, AuthError> {
        let update = ProfileUpdate {
            email: clean_opt("email", update.email.as_deref())?,
            first_name: clean_opt("first name", update.first_name.as_deref())?,
            last_name: clean_opt("last name", update.last_name.as_deref())?,
            phone: clean_opt("phone", update.phone.as_deref())?,
        };
        let body = serde_json::to_value(&update)
            .map_err(|e| AuthError::Unknown(format!("Failed to encode profile: {e}")))?;

        let response = self.authorized(Method::Put, PROFILE_PATH, Some(body)).await?;

        let user = match serde_json::from_value::<ProfileResponse>(response) {
            Ok(parsed) => parsed.into_user(),
            Err(_) => {
                let mut user = self.inner.store.user().ok_or(AuthError::NotSignedIn)?;
                merge_profile(&mut user, update);
                user
            }
        };

        self.inner.store.save_user(&user).map_err(AuthError::storage)?;
        self.inner.user_tx.send_replace(Some(user.clone()));
        tracing::info!(user_id = %user.id, "Profile updated");
        self.emit(SessionEvent::ProfileUpdated {
            user_id: user.id.clone(),
        });
        Ok(user)
    }

    // ── Password reset ──────────────────────────────────────────────

    /// Ask the server to email a reset link. Throttled like login.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let inner = &self.inner;
        let window_ms = inner.config.login_attempt_window_ms;
        if !inner.limiter.is_allowed(
            PASSWORD_RESET_ACTION,
            inner.config.max_login_attempts,
            window_ms,
        ) {
            let retry_after_ms = inner.limiter.retry_after_ms(PASSWORD_RESET_ACTION, window_ms);
            return Err(AuthError::TooManyAttempts {
                retry_after_secs: retry_after_ms.div_ceil(1000),
            });
        }

        let email = clean("email", email)?;
        inner.limiter.record_attempt(PASSWORD_RESET_ACTION);
        inner
            .transport
            .post(FORGOT_PASSWORD_PATH, json!({ "email": email }), None)
            .await
            .map_err(|e| self.classify(&e))?;
        tracing::info!(email = %email, "Password reset requested");
        Ok(())
    }

    /// Set a new password using the token from the reset link.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), AuthError> {
        let reset_token = reset_token.trim();
        if reset_token.is_empty() {
            return Err(AuthError::InvalidInput {
                field: "reset token",
            });
        }
        screen("reset token", reset_token)?;
        screen_secret("password", new_password)?;

        self.inner
            .transport
            .post(
                RESET_PASSWORD_PATH,
                json!({ "token": reset_token, "password": new_password }),
                None,
            )
            .await
            .map_err(|e| self.classify(&e))?;
        tracing::info!("Password reset completed");
        Ok(())
    }

    // ── Startup ─────────────────────────────────────────────────────

    /// Decide at startup whether the stored session can be trusted.
    ///
    /// A valid session is published and its refresh re-armed. An expired
    /// token with a refresh token and recent activity is refreshed once.
    /// Anything else stored is discarded. Returns whether the user is
    /// signed in afterwards.
    pub async fn restore(&self) -> bool {
        let inner = &self.inner;
        let Some(record) = inner.store.load() else {
            if inner.store.has_any() {
                tracing::warn!("Discarding incomplete stored session");
                self.destroy(LogoutReason::Expired);
            }
            return false;
        };

        if inner.activity.is_expired() {
            tracing::info!(user_id = %record.user.id, "Stored session idle-expired");
            self.destroy(LogoutReason::Expired);
            return false;
        }

        let token_valid = inner.validator.is_valid(&record.access_token);
        if !token_valid && record.refresh_token.is_none() {
            tracing::info!(user_id = %record.user.id, "Stored token expired");
            self.destroy(LogoutReason::Expired);
            return false;
        }

        let armed = token_valid && self.arm_refresh(&record.access_token);
        if !armed && record.refresh_token.is_some() {
            if let Err(e) = self.refresh_token().await {
                tracing::info!("Could not renew stored session: {e}");
                return false;
            }
        }

        inner.user_tx.send_replace(Some(record.user));
        self.is_authenticated()
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Map a transport failure into the error taxonomy.
    fn classify(&self, err: &TransportError) -> AuthError {
        if let Some(mapped) = AuthError::from_status(err) {
            return mapped;
        }
        let status = self.inner.probe.current_status();
        if !status.online {
            AuthError::NetworkOffline
        } else {
            AuthError::BackendUnreachable
        }
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

/// Body of the scheduled refresh. Boxed to keep the refresh future type
/// from referring to itself through the scheduler.
fn scheduled_refresh(inner: Weak<Inner>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let service = AuthService { inner };
        if service.inner.activity.is_expired() {
            tracing::debug!("Session idle, skipping scheduled refresh");
            return;
        }
        if let Err(e) = service.refresh_token().await {
            tracing::debug!("Scheduled refresh failed: {e}");
        }
    })
}

fn screen(field: &'static str, value: &str) -> Result<(), AuthError> {
    if let Some(hit) = find_injection(value) {
        tracing::warn!(field, pattern = hit.pattern_id, "Rejected input");
        return Err(AuthError::InvalidInput { field });
    }
    Ok(())
}

fn screen_secret(field: &'static str, value: &str) -> Result<(), AuthError> {
    if let Some(hit) = find_secret_injection(value) {
        tracing::warn!(field, pattern = hit.pattern_id, "Rejected input");
        return Err(AuthError::InvalidInput { field });
    }
    Ok(())
}

/// Whether an auth response body carries an access token under any of
/// the accepted keys.
fn carries_token(body: &JsonValue) -> bool {
    ["token", "access_token", "accessToken"].iter().any(|key| {
        body.get(key)
            .and_then(JsonValue::as_str)
            .is_some_and(|token| !token.is_empty())
    })
}

fn clean(field: &'static str, value: &str) -> Result<String, AuthError> {
    let cleaned = sanitize(value);
    if cleaned.is_empty() {
        return Err(AuthError::InvalidInput { field });
    }
    screen(field, &cleaned)?;
    Ok(cleaned)
}

fn clean_opt(field: &'static str, value: Option<&str>) -> Result<Option<String>, AuthError> {
    value
        .map(sanitize)
        .filter(|v| !v.is_empty())
        .map(|v| screen(field, &v).map(|()| v))
        .transpose()
}

fn merge_profile(user: &mut UserSnapshot, update: ProfileUpdate) {
    if let Some(email) = update.email {
        user.email = email;
    }
    if let Some(first_name) = update.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = update.last_name {
        user.last_name = last_name;
    }
    if let Some(phone) = update.phone {
        user.phone = Some(phone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::token_expiring_at;
    use crate::auth::types::UserRole;
    use crate::clock::ManualClock;
    use crate::net::ConnectivityStatus;
    use crate::testing::{settle, FixedProbe, ScriptedTransport};
    use std::time::Duration;

    const NOW_SECS: i64 = 1_700_000_000;

    struct Harness {
        service: AuthService,
        transport: Arc<ScriptedTransport>,
        storage: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        probe: Arc<FixedProbe>,
    }

    impl Harness {
        fn store(&self) -> TokenStore {
            TokenStore::new(self.storage.clone(), "portal")
        }

        fn advance_secs(&self, secs: i64) {
            self.clock.advance_ms(secs * 1000);
        }

        async fn logged_in(&self, exp_secs: i64) -> UserSnapshot {
            self.transport.push(LOGIN_PATH, Ok(login_response(exp_secs)));
            self.service
                .login("anna@camps.example", "correct horse")
                .await
                .unwrap()
        }
    }

    fn config() -> AuthConfig {
        AuthConfig {
            max_login_attempts: 3,
            login_attempt_window_ms: 60_000,
            refresh_skew_secs: 300,
            session_idle_timeout_secs: 1800,
            ..AuthConfig::default()
        }
    }

    fn harness() -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW_SECS * 1000));
        let probe = Arc::new(FixedProbe::new(ConnectivityStatus::ONLINE));
        let service = AuthService::builder(config(), transport.clone())
            .storage(storage.clone())
            .clock(clock.clone())
            .probe(probe.clone())
            .build()
            .unwrap();
        Harness {
            service,
            transport,
            storage,
            clock,
            probe,
        }
    }

    fn user() -> UserSnapshot {
        UserSnapshot {
            id: "u-42".into(),
            email: "anna@camps.example".into(),
            first_name: "Anna".into(),
            last_name: "Ivanova".into(),
            phone: None,
            role: UserRole::Guest,
        }
    }

    fn login_response(exp_secs: i64) -> JsonValue {
        json!({
            "token": token_expiring_at(exp_secs),
            "refresh_token": "refresh-1",
            "user": user(),
        })
    }

    fn refresh_response(exp_secs: i64) -> JsonValue {
        json!({ "token": token_expiring_at(exp_secs) })
    }

    // ── login ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn login_persists_session_and_arms_refresh() {
        let h = harness();
        let mut user_rx = h.service.subscribe_user();

        let user = h.logged_in(NOW_SECS + 3600).await;

        assert_eq!(user, self::user());
        assert!(h.service.is_authenticated());
        assert!(h.service.is_refresh_scheduled());
        let record = h.store().load().unwrap();
        assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(record.last_activity_ms, Some(NOW_SECS * 1000));
        assert!(user_rx.has_changed().unwrap());
        assert_eq!(user_rx.borrow_and_update().as_ref(), Some(&user));
    }

    #[tokio::test]
    async fn successful_login_clears_attempt_history() {
        let h = harness();
        h.transport.push(LOGIN_PATH, Err(TransportError::from_status(401, None)));
        let _ = h.service.login("anna@camps.example", "wrong").await;
        assert!(h.storage.get("portal.attempts.login").is_some());

        h.logged_in(NOW_SECS + 3600).await;
        assert!(h.storage.get("portal.attempts.login").is_none());
    }

    #[tokio::test]
    async fn third_failure_then_blocked_without_network() {
        let h = harness();
        for _ in 0..3 {
            h.transport.push(LOGIN_PATH, Err(TransportError::from_status(401, None)));
            let err = h.service.login("anna@camps.example", "wrong").await.unwrap_err();
            assert_eq!(err, AuthError::CredentialsRejected);
            h.advance_secs(3);
        }

        let err = h.service.login("anna@camps.example", "right").await.unwrap_err();
        assert!(matches!(err, AuthError::TooManyAttempts { retry_after_secs } if retry_after_secs == 51));
        assert_eq!(h.transport.calls_to(LOGIN_PATH), 3);

        h.advance_secs(60);
        h.transport.push(LOGIN_PATH, Ok(login_response(NOW_SECS + 7200)));
        assert!(h.service.login("anna@camps.example", "right").await.is_ok());
    }

    #[tokio::test]
    async fn identifier_is_sanitized_and_password_sent_verbatim() {
        let h = harness();
        h.transport.push(LOGIN_PATH, Ok(login_response(NOW_SECS + 3600)));

        h.service.login("  admin<script> ", " p<a>ss ").await.unwrap();

        let requests = h.transport.requests();
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["email"], "admin");
        assert_eq!(body["password"], " p<a>ss ");
        assert!(!body["email"].to_string().contains("<script>"));
    }

    #[tokio::test]
    async fn injection_is_rejected_locally_without_penalty() {
        let h = harness();

        let err = h.service.login("admin' --", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidInput { field: "email" });

        let err = h.service.login("admin", "' OR '1'='1").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidInput { field: "password" });

        let err = h.service.login("  <> ", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidInput { field: "email" });

        assert_eq!(h.transport.total_calls(), 0);
        assert!(h.storage.get("portal.attempts.login").is_none());
    }

    #[tokio::test]
    async fn login_failures_are_classified() {
        let h = harness();

        h.probe.set(ConnectivityStatus {
            online: false,
            backend_reachable: false,
        });
        h.transport.push(LOGIN_PATH, Err(TransportError::network("dns")));
        assert_eq!(
            h.service.login("anna@camps.example", "pw").await.unwrap_err(),
            AuthError::NetworkOffline
        );

        h.probe.set(ConnectivityStatus {
            online: true,
            backend_reachable: false,
        });
        h.transport.push(LOGIN_PATH, Err(TransportError::network("refused")));
        assert_eq!(
            h.service.login("anna@camps.example", "pw").await.unwrap_err(),
            AuthError::BackendUnreachable
        );

        h.storage.remove("portal.attempts.login").unwrap();
        h.probe.set(ConnectivityStatus::ONLINE);
        h.transport.push(LOGIN_PATH, Err(TransportError::from_status(403, None)));
        assert_eq!(
            h.service.login("anna@camps.example", "pw").await.unwrap_err(),
            AuthError::AccountSuspended
        );

        h.transport.push(LOGIN_PATH, Err(TransportError::from_status(502, None)));
        assert_eq!(
            h.service.login("anna@camps.example", "pw").await.unwrap_err(),
            AuthError::ServerError { status: 502 }
        );
    }

    #[tokio::test]
    async fn punctuation_heavy_password_is_accepted() {
        let h = harness();
        h.transport.push(LOGIN_PATH, Ok(login_response(NOW_SECS + 3600)));
        h.service.login("anna@camps.example", "online=yes'Orange=7").await.unwrap();
        assert_eq!(
            h.transport.requests()[0].body.as_ref().unwrap()["password"],
            "online=yes'Orange=7"
        );
    }

    #[tokio::test]
    async fn login_with_unrepresentable_expiry_does_not_panic() {
        let h = harness();
        let token = crate::auth::token::encode_unsigned(&json!({ "exp": -1e19 }));
        h.transport.push(
            LOGIN_PATH,
            Ok(json!({ "token": token, "refresh_token": "refresh-1", "user": user() })),
        );

        h.service.login("anna@camps.example", "pw").await.unwrap();
        assert!(!h.service.is_refresh_scheduled());
        assert!(!h.service.is_authenticated());
    }

    #[tokio::test]
    async fn login_response_without_user_is_unknown_error() {
        let h = harness();
        h.transport
            .push(LOGIN_PATH, Ok(json!({ "token": token_expiring_at(NOW_SECS + 60) })));
        let err = h.service.login("anna@camps.example", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Unknown(_)));
        assert!(!h.service.is_authenticated());
    }

    // ── scheduled and explicit refresh ──────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn scheduled_refresh_fires_once_before_expiry() {
        let h = harness();
        h.logged_in(NOW_SECS + 600).await;
        h.transport
            .push(REFRESH_PATH, Ok(refresh_response(NOW_SECS + 301 + 7200)));

        tokio::time::advance(Duration::from_secs(299)).await;
        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 0);

        h.advance_secs(301);
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);

        tokio::time::advance(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);
        assert!(h.service.is_authenticated());
        assert!(h.service.is_refresh_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_refresh_skips_idle_session() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;

        h.advance_secs(3301);
        tokio::time::advance(Duration::from_secs(3301)).await;
        settle().await;

        assert_eq!(h.transport.calls_to(REFRESH_PATH), 0);
        assert!(h.store().load().is_some());
        assert!(!h.service.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_replaces_token_and_keeps_user() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        let mut events = h.service.subscribe_events();
        let new_token = token_expiring_at(NOW_SECS + 7200);
        h.transport.push(
            REFRESH_PATH,
            Ok(json!({ "token": new_token, "refresh_token": "refresh-2" })),
        );

        h.service.refresh_token().await.unwrap();

        let record = h.store().load().unwrap();
        assert_eq!(record.access_token, new_token);
        assert_eq!(record.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(record.user, user());
        assert_eq!(h.transport.requests()[1].body, Some(json!({ "refresh_token": "refresh-1" })));
        assert!(h.service.is_refresh_scheduled());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    }

    #[tokio::test]
    async fn failed_refresh_destroys_session() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        let mut events = h.service.subscribe_events();
        h.transport.push(REFRESH_PATH, Err(TransportError::network("reset")));

        let err = h.service.refresh_token().await.unwrap_err();

        assert_eq!(err, AuthError::BackendUnreachable);
        assert!(!h.store().has_any());
        assert!(!h.service.is_refresh_scheduled());
        assert!(!h.service.is_authenticated());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed
            }
        );
        assert!(h.service.subscribe_user().borrow().is_none());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_is_fatal() {
        let h = harness();
        h.transport.push(
            LOGIN_PATH,
            Ok(json!({ "token": token_expiring_at(NOW_SECS + 3600), "user": user() })),
        );
        h.service.login("anna@camps.example", "pw").await.unwrap();

        let err = h.service.refresh_token().await.unwrap_err();

        assert_eq!(err, AuthError::NoRefreshToken);
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 0);
        assert!(!h.store().has_any());
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_request() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        h.transport
            .push(REFRESH_PATH, Ok(refresh_response(NOW_SECS + 7200)));
        h.transport.hold();

        let first = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        let second = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        settle().await;
        h.transport.release(1);

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn logout_during_refresh_discards_the_response() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        let mut events = h.service.subscribe_events();
        h.transport.push(
            REFRESH_PATH,
            Ok(json!({ "token": token_expiring_at(NOW_SECS + 7200), "refresh_token": "refresh-2" })),
        );
        h.transport.hold();

        let refresh = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        settle().await;
        assert!(h.service.logout(false).is_none());
        assert!(h.storage.is_empty());
        h.transport.release(1);

        assert_eq!(refresh.await.unwrap(), Err(AuthError::NotSignedIn));
        assert!(h.storage.is_empty());
        assert!(!h.service.is_refresh_scheduled());
        assert_eq!(h.service.access_token().await, Err(AuthError::NotSignedIn));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::Expired
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_request_during_refresh_keeps_session_ended() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        h.transport
            .push("/bookings", Err(TransportError::from_status(401, None)));
        h.transport.push(REFRESH_PATH, Ok(refresh_response(NOW_SECS + 7200)));
        h.transport.hold();

        let request = tokio::spawn({
            let service = h.service.clone();
            async move { service.authorized(Method::Get, "/bookings", None).await }
        });
        settle().await;
        let refresh = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        settle().await;

        h.transport.release(1);
        assert_eq!(request.await.unwrap(), Err(AuthError::CredentialsRejected));
        assert!(h.storage.is_empty());

        h.transport.release(1);
        assert_eq!(refresh.await.unwrap(), Err(AuthError::NotSignedIn));
        assert!(h.storage.is_empty());
        assert!(!h.service.is_refresh_scheduled());
        assert_eq!(h.service.current_user(), None);
    }

    #[tokio::test]
    async fn queued_refresh_reports_the_failure_it_waited_on() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        let mut events = h.service.subscribe_events();
        h.transport
            .push(REFRESH_PATH, Err(TransportError::from_status(500, None)));
        h.transport.hold();

        let first = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        let second = tokio::spawn({
            let service = h.service.clone();
            async move { service.refresh_token().await }
        });
        settle().await;
        h.transport.release(1);

        let failed = Err(AuthError::ServerError { status: 500 });
        assert_eq!(first.await.unwrap(), failed);
        assert_eq!(second.await.unwrap(), failed);
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_with_nothing_stored_is_quiet() {
        let h = harness();
        let mut events = h.service.subscribe_events();
        assert_eq!(h.service.refresh_token().await, Err(AuthError::NotSignedIn));
        assert_eq!(h.transport.total_calls(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn access_token_refreshes_inside_skew() {
        let h = harness();
        h.logged_in(NOW_SECS + 200).await;
        let fresh = token_expiring_at(NOW_SECS + 3600);
        h.transport.push(REFRESH_PATH, Ok(json!({ "token": fresh })));

        assert_eq!(h.service.access_token().await.unwrap(), fresh);
        assert_eq!(h.service.access_token().await.unwrap(), fresh);
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);
    }

    // ── is_authenticated ────────────────────────────────────────────

    #[tokio::test]
    async fn expired_token_is_not_authenticated_and_makes_no_call() {
        let h = harness();
        let store = h.store();
        store
            .save_session(&token_expiring_at(NOW_SECS - 1), Some("refresh-1"), &user())
            .unwrap();
        store.set_last_activity_ms(NOW_SECS * 1000).unwrap();

        assert!(!h.service.is_authenticated());
        assert_eq!(h.transport.total_calls(), 0);
        assert!(store.load().is_some());
    }

    #[tokio::test]
    async fn idle_session_is_not_authenticated_even_with_valid_token() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;

        h.advance_secs(1800);
        assert!(h.service.is_authenticated());
        h.advance_secs(1);
        assert!(!h.service.is_authenticated());
    }

    #[tokio::test]
    async fn corrupt_storage_fails_closed() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;

        h.storage.set("portal.user", "{not json").unwrap();
        assert!(!h.service.is_authenticated());
        assert!(h.service.current_user().is_none());

        h.storage.set("portal.user", &serde_json::to_string(&user()).unwrap()).unwrap();
        h.storage.set("portal.access_token", "garbage").unwrap();
        assert!(!h.service.is_authenticated());
    }

    // ── logout ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn logout_is_total_and_idempotent() {
        let h = harness();
        assert!(h.service.logout(true).is_none());
        assert!(h.storage.is_empty());

        let token = token_expiring_at(NOW_SECS + 3600);
        h.transport.push(
            LOGIN_PATH,
            Ok(json!({ "token": token, "refresh_token": "refresh-1", "user": user() })),
        );
        h.service.login("anna@camps.example", "pw").await.unwrap();
        h.transport.push(LOGOUT_PATH, Err(TransportError::from_status(500, None)));

        let notify = h.service.logout(true).expect("notification spawned");
        assert!(h.service.logout(true).is_none());
        notify.await.unwrap();

        assert!(h.storage.is_empty());
        assert!(!h.service.is_refresh_scheduled());
        assert!(!h.service.is_authenticated());

        let notifications: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.path == LOGOUT_PATH)
            .collect();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].bearer.as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn automatic_logout_does_not_notify_server() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        assert!(h.service.logout(false).is_none());
        assert_eq!(h.transport.calls_to(LOGOUT_PATH), 0);
        assert!(!h.store().has_any());
    }

    // ── authorized calls and profile ────────────────────────────────

    #[tokio::test]
    async fn unauthorized_response_destroys_session() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        h.transport
            .push("/bookings", Err(TransportError::from_status(401, None)));

        let err = h
            .service
            .authorized(Method::Get, "/bookings", None)
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::CredentialsRejected);
        assert!(!h.store().has_any());
    }

    #[tokio::test]
    async fn forbidden_response_keeps_session() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        h.transport
            .push("/admin/camps", Err(TransportError::from_status(403, None)));

        let err = h
            .service
            .authorized(Method::Get, "/admin/camps", None)
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::AccountSuspended);
        assert!(h.service.is_authenticated());
    }

    #[tokio::test]
    async fn update_profile_overwrites_only_user() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        let token_before = h.store().access_token();
        let mut updated = user();
        updated.first_name = "Anya".into();
        h.transport
            .push(PROFILE_PATH, Ok(json!({ "user": updated })));

        let user = h
            .service
            .update_profile(&ProfileUpdate {
                first_name: Some("  <b>Anya</b> ".into()),
                ..ProfileUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(user.first_name, "Anya");
        let request = h.transport.requests().pop().unwrap();
        assert_eq!(request.body, Some(json!({ "first_name": "Anya" })));
        assert_eq!(h.store().access_token(), token_before);
        assert_eq!(h.store().user().unwrap().first_name, "Anya");
        assert!(h.service.is_refresh_scheduled());
    }

    #[tokio::test]
    async fn update_profile_merges_when_server_returns_no_body() {
        let h = harness();
        h.logged_in(NOW_SECS + 3600).await;
        h.transport.push(PROFILE_PATH, Ok(JsonValue::Null));

        let user = h
            .service
            .update_profile(&ProfileUpdate {
                phone: Some("+7 900 123-45-67".into()),
                ..ProfileUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(user.phone.as_deref(), Some("+7 900 123-45-67"));
        assert_eq!(user.first_name, "Anna");
    }

    #[tokio::test]
    async fn update_profile_without_session_fails() {
        let h = harness();
        let mut events = h.service.subscribe_events();
        let err = h
            .service
            .update_profile(&ProfileUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotSignedIn);
        assert_eq!(h.transport.total_calls(), 0);
        assert!(events.try_recv().is_err());
    }

    // ── registration ────────────────────────────────────────────────

    #[tokio::test]
    async fn register_with_token_signs_in() {
        let h = harness();
        h.transport
            .push(REGISTER_PATH, Ok(login_response(NOW_SECS + 3600)));

        let outcome = h
            .service
            .register(
                &RegistrationProfile {
                    email: " anna@camps.example ".into(),
                    first_name: "Anna".into(),
                    last_name: "<i>Ivanova</i>".into(),
                    phone: None,
                },
                "s3cret<>",
            )
            .await
            .unwrap();

        assert_eq!(outcome, RegistrationOutcome::SignedIn(user()));
        assert!(h.service.is_authenticated());
        let body = h.transport.requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            json!({
                "email": "anna@camps.example",
                "first_name": "Anna",
                "last_name": "Ivanova",
                "password": "s3cret<>",
            })
        );
    }

    #[tokio::test]
    async fn register_token_without_user_is_an_error() {
        let h = harness();
        h.transport.push(
            REGISTER_PATH,
            Ok(json!({ "access_token": token_expiring_at(NOW_SECS + 3600) })),
        );

        let err = h
            .service
            .register(
                &RegistrationProfile {
                    email: "anna@camps.example".into(),
                    first_name: "Anna".into(),
                    last_name: "Ivanova".into(),
                    phone: None,
                },
                "pw",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Unknown(_)));
        assert!(!h.store().has_any());
    }

    #[tokio::test]
    async fn register_without_token_needs_login() {
        let h = harness();
        h.transport
            .push(REGISTER_PATH, Ok(json!({ "message": "Check your email" })));

        let outcome = h
            .service
            .register(
                &RegistrationProfile {
                    email: "anna@camps.example".into(),
                    first_name: "Anna".into(),
                    last_name: "Ivanova".into(),
                    phone: Some("+7 900".into()),
                },
                "pw",
            )
            .await
            .unwrap();

        assert_eq!(outcome, RegistrationOutcome::PendingLogin);
        assert!(!h.store().has_any());
    }

    // ── password reset ──────────────────────────────────────────────

    #[tokio::test]
    async fn password_reset_request_is_rate_limited() {
        let h = harness();
        for _ in 0..3 {
            h.transport.push(FORGOT_PASSWORD_PATH, Ok(JsonValue::Null));
            h.service
                .request_password_reset(" anna@camps.example ")
                .await
                .unwrap();
        }

        let err = h
            .service
            .request_password_reset("anna@camps.example")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TooManyAttempts { .. }));
        assert_eq!(h.transport.calls_to(FORGOT_PASSWORD_PATH), 3);
        assert_eq!(
            h.transport.requests()[0].body,
            Some(json!({ "email": "anna@camps.example" }))
        );
    }

    #[tokio::test]
    async fn reset_password_posts_token_and_password() {
        let h = harness();
        h.transport.push(RESET_PASSWORD_PATH, Ok(JsonValue::Null));

        h.service.reset_password(" abc123 ", "n3w P@ss").await.unwrap();
        assert_eq!(
            h.transport.requests()[0].body,
            Some(json!({ "token": "abc123", "password": "n3w P@ss" }))
        );

        let err = h.service.reset_password("  ", "x").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidInput { field: "reset token" });
    }

    // ── restore ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn restore_trusts_valid_session() {
        let h = harness();
        let store = h.store();
        store
            .save_session(&token_expiring_at(NOW_SECS + 3600), Some("refresh-1"), &user())
            .unwrap();
        store.set_last_activity_ms(NOW_SECS * 1000 - 60_000).unwrap();

        assert!(h.service.restore().await);
        assert!(h.service.is_refresh_scheduled());
        assert_eq!(h.service.subscribe_user().borrow().as_ref(), Some(&user()));
        assert_eq!(h.transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn restore_refreshes_expired_token_once() {
        let h = harness();
        let store = h.store();
        store
            .save_session(&token_expiring_at(NOW_SECS - 60), Some("refresh-1"), &user())
            .unwrap();
        store.set_last_activity_ms(NOW_SECS * 1000).unwrap();
        h.transport
            .push(REFRESH_PATH, Ok(refresh_response(NOW_SECS + 3600)));

        assert!(h.service.restore().await);
        assert_eq!(h.transport.calls_to(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn restore_discards_corrupt_or_idle_sessions() {
        let h = harness();
        h.storage.set("portal.access_token", "a.b.c").unwrap();
        h.storage.set("portal.user", "][").unwrap();
        assert!(!h.service.restore().await);
        assert!(!h.store().has_any());

        let store = h.store();
        store
            .save_session(&token_expiring_at(NOW_SECS + 3600), Some("refresh-1"), &user())
            .unwrap();
        store.set_last_activity_ms(NOW_SECS * 1000 - 3_600_000).unwrap();
        assert!(!h.service.restore().await);
        assert!(!h.store().has_any());
        assert_eq!(h.transport.total_calls(), 0);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = AuthConfig {
            api_base_url: " ".into(),
            ..AuthConfig::default()
        };
        let result = AuthService::builder(config, Arc::new(ScriptedTransport::new())).build();
        assert!(matches!(result, Err(AuthError::Config(_))));
    }
}
