//! Viewer session store with automatic token refresh.
//!
//! Holds the signed-in viewer's tokens in memory for the life of the app
//! process and tracks auth state through an explicit FSM. Observers follow
//! state changes through a watch channel; the service layer keys service
//! initialization and teardown off those notifications.

use crate::auth_fsm::{
    AuthState, RefreshConfig, SessionMachine, SessionMachineInput,
};
use crate::error::{SessionError, SessionResult};
use chat_types::UserId;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Seconds before the recorded deadline at which a token counts as expired.
///
/// Refreshing slightly early keeps in-flight requests from racing the real
/// expiry on the server.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// The signed-in viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// Session data held while signed in.
#[derive(Debug, Clone)]
struct ActiveSession {
    access_token: String,
    refresh_token: String,
    user_id: UserId,
    email: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Supabase token refresh request.
#[derive(Debug, Serialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Supabase token grant response (password and refresh grants share it).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

fn is_expired(expires_at: DateTime<Utc>) -> bool {
    expires_at <= Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// Session store for the signed-in viewer with FSM-based state tracking.
///
/// The FSM tracks transient states (signing in, refreshing, signing out)
/// while the token data lives alongside it in memory. All state changes are
/// published on a watch channel.
pub struct SessionStore {
    api_url: String,
    anon_key: String,
    http_client: Client,
    /// Internal FSM for tracking auth state transitions.
    fsm: Mutex<SessionMachine>,
    /// Token data for the active session, if any.
    session: RwLock<Option<ActiveSession>>,
    /// Configuration for refresh retry behavior.
    refresh_config: RefreshConfig,
    /// Publishes every observed state change.
    state_tx: watch::Sender<AuthState>,
}

impl SessionStore {
    /// Create a new session store.
    pub fn new(api_url: &str, anon_key: &str) -> Self {
        Self::with_refresh_config(api_url, anon_key, RefreshConfig::default())
    }

    /// Create a new session store with custom refresh configuration.
    pub fn with_refresh_config(api_url: &str, anon_key: &str, refresh_config: RefreshConfig) -> Self {
        let (state_tx, _) = watch::channel(AuthState::SignedOut);
        Self {
            api_url: api_url.to_string(),
            anon_key: anon_key.to_string(),
            http_client: Client::new(),
            fsm: Mutex::new(SessionMachine::new()),
            session: RwLock::new(None),
            refresh_config,
            state_tx,
        }
    }

    /// Subscribe to auth state changes.
    ///
    /// The receiver immediately holds the current state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Get the current auth state.
    pub fn auth_state(&self) -> AuthState {
        let fsm = self.fsm.lock().expect("lock poisoned");
        AuthState::from(fsm.state())
    }

    /// Transition the FSM and publish the new state if it changed.
    fn transition(&self, input: &SessionMachineInput) -> SessionResult<AuthState> {
        let mut fsm = self.fsm.lock().expect("lock poisoned");
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Auth state transition"
            );
            self.state_tx.send_replace(new_state.clone());
        }

        Ok(new_state)
    }

    /// Sign in with email and password.
    ///
    /// Drives the FSM through SignedOut -> SigningIn -> (SignedIn | SignedOut)
    /// and exchanges the credentials with the Supabase auth endpoint.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> SessionResult<Viewer> {
        self.transition(&SessionMachineInput::SignInAttempt)?;

        let token_url = format!("{}/auth/v1/token?grant_type=password", self.api_url);

        debug!(url = %token_url, email = %email, "Attempting email/password sign-in");

        let response = self
            .http_client
            .post(&token_url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.transition(&SessionMachineInput::SignInFailed)?;
                return Err(SessionError::Http(e));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Sign-in failed");
            self.transition(&SessionMachineInput::SignInFailed)?;
            return Err(SessionError::InvalidCredentials(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                self.transition(&SessionMachineInput::SignInFailed)?;
                return Err(SessionError::Http(e));
            }
        };

        let expires_at = Utc::now() + Duration::seconds(data.expires_in);
        let viewer = Viewer {
            user_id: UserId::from_string(data.user.id.clone()),
            email: data.user.email.clone(),
        };

        {
            let mut session = self.session.write().expect("lock poisoned");
            *session = Some(ActiveSession {
                access_token: data.access_token,
                refresh_token: data.refresh_token,
                user_id: viewer.user_id.clone(),
                email: viewer.email.clone(),
                expires_at,
            });
        }

        self.transition(&SessionMachineInput::SignInSuccess)?;

        info!(user_id = %viewer.user_id, "Sign-in successful");

        Ok(viewer)
    }

    /// Get the signed-in viewer, if any.
    pub fn current_viewer(&self) -> Option<Viewer> {
        let session = self.session.read().expect("lock poisoned");
        session.as_ref().map(|s| Viewer {
            user_id: s.user_id.clone(),
            email: s.email.clone(),
        })
    }

    /// Check if a viewer session is present with an unexpired token.
    pub fn is_signed_in(&self) -> bool {
        let session = self.session.read().expect("lock poisoned");
        session.as_ref().is_some_and(|s| !is_expired(s.expires_at))
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn access_token(&self) -> SessionResult<String> {
        let (access_token, refresh_token, expires_at) = {
            let session = self.session.read().expect("lock poisoned");
            let session = session.as_ref().ok_or(SessionError::NotSignedIn)?;
            (
                session.access_token.clone(),
                session.refresh_token.clone(),
                session.expires_at,
            )
        };

        if !is_expired(expires_at) {
            return Ok(access_token);
        }

        info!("Access token expired, attempting refresh");
        self.transition(&SessionMachineInput::TokenExpired)?;

        self.refresh_with_backoff(&refresh_token).await
    }

    /// Refresh the session with exponential backoff retry.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> SessionResult<String> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(token) => {
                    self.transition(&SessionMachineInput::RefreshSuccess)?;
                    return Ok(token);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);

                    if attempt + 1 < self.refresh_config.max_retries {
                        // Signal retry (stays in Refreshing state)
                        let _ = self.transition(&SessionMachineInput::RefreshRetry);

                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis(),
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    // Non-transient error, fail immediately
                    warn!("Refresh failed with non-transient error: {}", e);
                    self.clear_session();
                    self.transition(&SessionMachineInput::RefreshFailed)?;
                    return Err(e);
                }
            }
        }

        warn!(
            "Refresh failed after {} attempts",
            self.refresh_config.max_retries
        );
        self.clear_session();
        self.transition(&SessionMachineInput::RefreshFailed)?;

        Err(last_error.unwrap_or(SessionError::RefreshExhausted(self.refresh_config.max_retries)))
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, refresh_token: &str) -> SessionResult<String> {
        let refresh_url = format!("{}/auth/v1/token?grant_type=refresh_token", self.api_url);

        debug!(url = %refresh_url, "Refreshing token");

        let response = self
            .http_client
            .post(&refresh_url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token refresh failed");

            // Session is cleared by the caller based on retry outcome
            return Err(SessionError::TokenRefresh(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(data.expires_in);
        let access_token = data.access_token.clone();

        {
            let mut session = self.session.write().expect("lock poisoned");
            *session = Some(ActiveSession {
                access_token: data.access_token,
                refresh_token: data.refresh_token,
                user_id: UserId::from_string(data.user.id.clone()),
                email: data.user.email,
                expires_at,
            });
        }

        info!(user_id = %data.user.id, "Token refreshed successfully");

        Ok(access_token)
    }

    /// Sign out by dropping the session data.
    ///
    /// Drives the FSM through SignedIn -> SigningOut -> SignedOut. The
    /// transitions are best-effort so a half-signed-in store still ends up
    /// cleared.
    pub fn sign_out(&self) {
        let _ = self.transition(&SessionMachineInput::SignOutRequested);

        self.clear_session();

        let _ = self.transition(&SessionMachineInput::SignOutComplete);

        info!("Signed out");
    }

    fn clear_session(&self) {
        let mut session = self.session.write().expect("lock poisoned");
        *session = None;
    }
}
