//! WebSocket realtime client.

use crate::messages::{room_from_topic, room_topic, ChangePayload, ChannelEvent, ChannelMessage, ReplyPayload};
use crate::{RealtimeError, RealtimeResult};
use chat_types::{Message as MessageRow, RoomId};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::time::{interval, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// Realtime client configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Realtime socket URL (e.g., wss://xyz.supabase.co/realtime/v1/websocket).
    pub url: String,
    /// Seconds between heartbeat frames.
    pub heartbeat_interval_secs: u64,
    /// First reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Reconnect delay ceiling in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Reconnect attempts before the client stays down.
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "wss://pairline.supabase.co/realtime/v1/websocket".to_string(),
            heartbeat_interval_secs: 30,
            reconnect_base_delay_secs: 2,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 10,
        }
    }
}

impl RealtimeConfig {
    /// Derive the socket URL from a project API URL, defaults elsewhere.
    pub fn for_project(api_url: &str) -> Self {
        Self {
            url: websocket_url(api_url),
            ..Default::default()
        }
    }
}

/// Convert a project API URL into its realtime websocket URL.
pub fn websocket_url(api_url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(api_url) {
        if let Some(host) = parsed.host_str() {
            let scheme = if parsed.scheme() == "http" { "ws" } else { "wss" };
            let port = parsed
                .port()
                .map(|p| format!(":{}", p))
                .unwrap_or_default();
            return format!("{}://{}{}/realtime/v1/websocket", scheme, host, port);
        }
    }

    let base = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_url.to_string()
    };
    format!("{}/realtime/v1/websocket", base.trim_end_matches('/'))
}

/// Socket lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Joining,
    Connected,
}

/// Events emitted by the realtime client.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// Socket established.
    Connected,
    /// Socket lost or closed.
    Disconnected(Option<String>),
    /// A room channel join was acknowledged.
    SubscriptionConfirmed { room_id: RoomId },
    /// A committed message row arrived on a room channel.
    MessageInserted { room_id: RoomId, row: MessageRow },
    /// Protocol or channel level failure.
    Error(String),
}

/// WebSocket realtime client with automatic reconnection.
///
/// Delivery is at-least-once with no sequence numbers; consumers are
/// expected to deduplicate by message identifier.
pub struct RealtimeClient {
    config: RealtimeConfig,
    state: Arc<RwLock<ConnectionState>>,
    /// Rooms whose channels should be (re)joined while connected.
    joined_rooms: Arc<RwLock<Vec<RoomId>>>,
    sender: Arc<Mutex<Option<mpsc::Sender<WsMessage>>>>,
    event_tx: broadcast::Sender<RealtimeEvent>,
    api_key: Arc<RwLock<Option<String>>>,
    reconnect_attempts: Arc<RwLock<u32>>,
    ref_counter: Arc<AtomicU64>,
}

impl RealtimeClient {
    /// Create a new realtime client with the given configuration.
    pub fn new(config: RealtimeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            joined_rooms: Arc::new(RwLock::new(Vec::new())),
            sender: Arc::new(Mutex::new(None)),
            event_tx,
            api_key: Arc::new(RwLock::new(None)),
            reconnect_attempts: Arc::new(RwLock::new(0)),
            ref_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Client with stock settings.
    pub fn with_defaults() -> Self {
        Self::new(RealtimeConfig::default())
    }

    /// New receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.event_tx.subscribe()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if connected (socket up, including while a join is in flight).
    pub async fn is_connected(&self) -> bool {
        matches!(
            *self.state.read().await,
            ConnectionState::Connected | ConnectionState::Joining
        )
    }

    /// Rooms whose channels are currently joined or pending rejoin.
    pub async fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined_rooms.read().await.clone()
    }

    /// Next Phoenix message reference.
    fn next_ref(&self) -> String {
        (self.ref_counter.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Connect to the realtime socket.
    pub async fn connect(&self, api_key: &str) -> RealtimeResult<()> {
        let state_now = *self.state.read().await;
        if state_now != ConnectionState::Disconnected {
            debug!(state = ?state_now, "Connect requested while already up");
            return Ok(());
        }

        // Kept so a reconnect can re-authenticate
        *self.api_key.write().await = Some(api_key.to_string());

        self.do_connect().await
    }

    /// One full connection lifetime: dial, pump frames, clean up, reschedule.
    async fn do_connect(&self) -> RealtimeResult<()> {
        *self.state.write().await = ConnectionState::Connecting;
        info!(url = %self.config.url, "Connecting to realtime socket");

        let api_key = self
            .api_key
            .read()
            .await
            .clone()
            .ok_or_else(|| RealtimeError::Connection("No API key".to_string()))?;
        let socket_url = format!("{}?apikey={}&vsn=1.0.0", self.config.url, api_key);

        let (ws_stream, _) = connect_async(&socket_url).await?;
        let (mut write, mut read) = ws_stream.split();

        // The writer task owns the sink half; everyone else queues through it
        let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(100);
        *self.sender.lock().await = Some(out_tx.clone());

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if write.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // Heartbeats keep the Phoenix socket from reaping the connection
        let heartbeat_out = out_tx.clone();
        let heartbeat_every = self.config.heartbeat_interval_secs;
        let heartbeat_refs = self.ref_counter.clone();
        let heartbeat_task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(heartbeat_every));
            loop {
                ticker.tick().await;
                let reference = (heartbeat_refs.fetch_add(1, Ordering::Relaxed) + 1).to_string();
                let heartbeat = ChannelMessage::heartbeat(&reference);
                if let Ok(json) = heartbeat.to_json() {
                    if heartbeat_out
                        .send(WsMessage::Text(json.into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });

        *self.state.write().await = ConnectionState::Connected;
        *self.reconnect_attempts.write().await = 0;
        info!("Realtime socket established");
        let _ = self.event_tx.send(RealtimeEvent::Connected);

        // Rejoin room channels from before the reconnect
        let rooms_to_join = self.joined_rooms.read().await.clone();
        if !rooms_to_join.is_empty() {
            *self.state.write().await = ConnectionState::Joining;
            for room_id in &rooms_to_join {
                let join = ChannelMessage::join(&room_topic(room_id), &self.next_ref());
                if let Ok(json) = join.to_json() {
                    let _ = out_tx.send(WsMessage::Text(json.into())).await;
                }
                debug!(room_id = %room_id, "Joining room channel");
            }
        }

        // Read loop; runs until the socket drops or closes
        let state = self.state.clone();
        let event_tx = self.event_tx.clone();
        let joined_rooms = self.joined_rooms.clone();

        while let Some(incoming) = read.next().await {
            match incoming {
                Ok(WsMessage::Text(text)) => match ChannelMessage::from_json(&text) {
                    Ok(channel_msg) => {
                        self.handle_message(&channel_msg, &state, &event_tx, &joined_rooms)
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse realtime frame");
                    }
                },
                Ok(WsMessage::Close(_)) => {
                    info!("Realtime connection closed");
                    break;
                }
                Ok(WsMessage::Ping(data)) => {
                    if let Some(sender) = self.sender.lock().await.as_ref() {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Socket read failed");
                    break;
                }
            }
        }

        // Cleanup; joined rooms are kept so a reconnect can rejoin them
        heartbeat_task.abort();
        writer_task.abort();
        *self.sender.lock().await = None;
        *self.state.write().await = ConnectionState::Disconnected;

        let _ = self.event_tx.send(RealtimeEvent::Disconnected(None));

        self.schedule_reconnect().await;

        Ok(())
    }

    /// Handle an incoming channel message.
    async fn handle_message(
        &self,
        msg: &ChannelMessage,
        state: &Arc<RwLock<ConnectionState>>,
        event_tx: &broadcast::Sender<RealtimeEvent>,
        joined_rooms: &Arc<RwLock<Vec<RoomId>>>,
    ) {
        match msg.event {
            ChannelEvent::Reply => {
                let reply: ReplyPayload = match serde_json::from_value(msg.payload.clone()) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "Failed to parse reply payload");
                        return;
                    }
                };

                let Some(room_id) = room_from_topic(&msg.topic) else {
                    // Heartbeat acknowledgements arrive as replies on the phoenix topic
                    debug!(topic = %msg.topic, "Socket reply");
                    return;
                };

                let joined = joined_rooms.read().await.iter().any(|r| r == &room_id);
                if reply.is_ok() && joined {
                    *state.write().await = ConnectionState::Connected;
                    info!(room_id = %room_id, "Room subscription confirmed");
                    let _ = event_tx.send(RealtimeEvent::SubscriptionConfirmed { room_id });
                } else if !reply.is_ok() {
                    *state.write().await = ConnectionState::Connected;
                    warn!(topic = %msg.topic, status = %reply.status, "Channel join rejected");
                    let _ = event_tx.send(RealtimeEvent::Error(format!(
                        "channel {} rejected: {}",
                        msg.topic, reply.status
                    )));
                } else {
                    debug!(topic = %msg.topic, "Reply for a channel no longer joined");
                }
            }
            ChannelEvent::Insert => {
                let Some(room_id) = room_from_topic(&msg.topic) else {
                    debug!(topic = %msg.topic, "Insert on unrecognized topic");
                    return;
                };

                let change: ChangePayload = match serde_json::from_value(msg.payload.clone()) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "Failed to parse change payload");
                        return;
                    }
                };

                let Some(record) = change.record else {
                    warn!(room_id = %room_id, "Insert event without record");
                    return;
                };

                match serde_json::from_value::<MessageRow>(record) {
                    Ok(row) => {
                        debug!(room_id = %room_id, message_id = %row.id, "Message insert received");
                        let _ = event_tx.send(RealtimeEvent::MessageInserted { room_id, row });
                    }
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "Failed to parse inserted message row");
                    }
                }
            }
            ChannelEvent::Update | ChannelEvent::Delete => {
                // Only inserts feed the log; edits and deletions are out of scope
                debug!(event = ?msg.event, topic = %msg.topic, "Ignoring non-insert change");
            }
            ChannelEvent::ChannelError => {
                warn!(topic = %msg.topic, "Channel errored");
                let _ = event_tx.send(RealtimeEvent::Error(format!(
                    "channel {} errored",
                    msg.topic
                )));
            }
            ChannelEvent::Close => {
                debug!(topic = %msg.topic, "Channel closed");
            }
            _ => {
                debug!(event = ?msg.event, "Received message");
            }
        }
    }

    /// Sleep out the backoff and dial again, unless the budget is spent.
    async fn schedule_reconnect(&self) {
        let mut attempts = self.reconnect_attempts.write().await;
        *attempts += 1;

        if *attempts > self.config.max_reconnect_attempts {
            warn!("Reconnect budget exhausted; staying down");
            return;
        }

        // base * 2^(n-1), capped
        let delay = std::cmp::min(
            self.config.reconnect_base_delay_secs * 2u64.pow(*attempts - 1),
            self.config.reconnect_max_delay_secs,
        );

        info!(attempt = *attempts, delay_secs = delay, "Reconnecting after backoff");

        drop(attempts);

        tokio::time::sleep(Duration::from_secs(delay)).await;

        if self.api_key.read().await.is_some() {
            if let Err(e) = Box::pin(self.do_connect()).await {
                error!(error = %e, "Reconnect attempt failed");
            }
        }
    }

    /// Tear the socket down and stop reconnecting.
    pub async fn disconnect(&self) {
        *self.reconnect_attempts.write().await = self.config.max_reconnect_attempts + 1;

        if let Some(sender) = self.sender.lock().await.take() {
            drop(sender);
        }

        *self.state.write().await = ConnectionState::Disconnected;
        self.joined_rooms.write().await.clear();
        *self.api_key.write().await = None;

        info!("Disconnected from realtime socket");
        let _ = self
            .event_tx
            .send(RealtimeEvent::Disconnected(Some("Client closed".to_string())));
    }

    /// Join a room's message channel.
    pub async fn join_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        if !self.is_connected().await {
            return Err(RealtimeError::NotConnected);
        }

        {
            let mut rooms = self.joined_rooms.write().await;
            if !rooms.iter().any(|r| r == room_id) {
                rooms.push(room_id.clone());
            }
        }

        *self.state.write().await = ConnectionState::Joining;

        let msg = ChannelMessage::join(&room_topic(room_id), &self.next_ref());
        self.send_message(msg).await
    }

    /// Leave a room's message channel.
    pub async fn leave_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        if !self.is_connected().await {
            return Err(RealtimeError::NotConnected);
        }

        self.joined_rooms.write().await.retain(|r| r != room_id);

        let msg = ChannelMessage::leave(&room_topic(room_id), &self.next_ref());
        self.send_message(msg).await
    }

    /// Queue one frame for the writer task.
    async fn send_message(&self, msg: ChannelMessage) -> RealtimeResult<()> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(RealtimeError::NotConnected)?;

        let json = msg.to_json()?;
        sender
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::Send(e.to_string()))
    }
}
