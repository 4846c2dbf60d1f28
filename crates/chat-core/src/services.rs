//! Service container and the ports the room view depends on.
//!
//! `ChatServices` wires the concrete backend, session store and realtime
//! client together and owns their lifecycle: `initialize` after sign-in,
//! `teardown` on sign-out. Room views consume the narrow `TokenProvider`,
//! `RealtimeFeed` and `AlertSink` ports so tests can substitute in-memory
//! fakes for the network-facing pieces.

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::session::RoomSession;
use chat_types::RoomId;
use realtime_bridge::{RealtimeClient, RealtimeEvent, RealtimeResult};
use session_store::{SessionError, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use supabase_backend::ChatBackend;
use tokio::sync::broadcast;

/// Sink for user-facing failure alerts.
///
/// Exactly one alert is raised per failed send and per failed room open.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// Default sink: surfaces alerts through the structured log.
pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn alert(&self, message: &str) {
        tracing::warn!(alert = %message, "User-facing alert");
    }
}

/// Supplies a current access token for backend calls.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> ChatResult<String>;
}

#[async_trait::async_trait]
impl TokenProvider for SessionStore {
    async fn access_token(&self) -> ChatResult<String> {
        Ok(SessionStore::access_token(self).await?)
    }
}

/// Live-update feed for room channels.
#[async_trait::async_trait]
pub trait RealtimeFeed: Send + Sync {
    fn events(&self) -> broadcast::Receiver<RealtimeEvent>;
    async fn join_room(&self, room_id: &RoomId) -> RealtimeResult<()>;
    async fn leave_room(&self, room_id: &RoomId) -> RealtimeResult<()>;
}

#[async_trait::async_trait]
impl RealtimeFeed for RealtimeClient {
    fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.subscribe()
    }

    async fn join_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        RealtimeClient::join_room(self, room_id).await
    }

    async fn leave_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        RealtimeClient::leave_room(self, room_id).await
    }
}

/// Owns the chat services for one signed-in session.
pub struct ChatServices {
    session: Arc<SessionStore>,
    backend: Arc<dyn ChatBackend>,
    realtime: Arc<RealtimeClient>,
    alerts: Arc<dyn AlertSink>,
    config: ChatConfig,
    initialized: AtomicBool,
}

impl ChatServices {
    pub fn new(
        session: Arc<SessionStore>,
        backend: Arc<dyn ChatBackend>,
        realtime: Arc<RealtimeClient>,
        alerts: Arc<dyn AlertSink>,
        config: ChatConfig,
    ) -> Self {
        Self {
            session,
            backend,
            realtime,
            alerts,
            config,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    pub fn realtime(&self) -> &Arc<RealtimeClient> {
        &self.realtime
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Bring up the realtime connection for the signed-in session.
    ///
    /// Called once after sign-in succeeds. The connect loop runs on its own
    /// task and keeps reconnecting until `teardown`.
    pub fn initialize(&self, api_key: &str) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Chat services already initialized");
            return;
        }
        let realtime = Arc::clone(&self.realtime);
        let api_key = api_key.to_string();
        tokio::spawn(async move {
            if let Err(e) = realtime.connect(&api_key).await {
                tracing::warn!(error = %e, "Realtime connection ended");
            }
        });
        tracing::info!("Chat services initialized");
    }

    /// Shut the realtime connection down.
    ///
    /// Called once on sign-out. Idempotent; a second call is a no-op.
    pub async fn teardown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            tracing::debug!("Chat services not initialized");
            return;
        }
        self.realtime.disconnect().await;
        tracing::info!("Chat services torn down");
    }

    /// Open a room view for the signed-in viewer.
    pub async fn open_room(&self, room_id: RoomId) -> ChatResult<RoomSession> {
        let viewer = self
            .session
            .current_viewer()
            .map(|v| v.user_id)
            .ok_or(ChatError::Session(SessionError::NotSignedIn))?;
        RoomSession::open(
            room_id,
            viewer,
            Arc::clone(&self.backend),
            Arc::clone(&self.session) as Arc<dyn TokenProvider>,
            Arc::clone(&self.realtime) as Arc<dyn RealtimeFeed>,
            Arc::clone(&self.alerts),
            self.config.clone(),
        )
        .await
    }
}
