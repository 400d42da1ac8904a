use crate::auth::listeners::{ListenerRegistry, Subscription};
use crate::chat::types::{ChatMessage, ConnectionState, MessageDraft};
use crate::config::ChatConfig;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Close code that suppresses reconnection.
const NORMAL_CLOSURE: u16 = 1000;

/// Failure to establish the chat connection.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Connection attempt timed out")]
    ConnectionTimeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Connection parameters for one conversation.
///
/// Reconnects reuse the same tuple; a refreshed token is only picked up by
/// the next explicit connect.
#[derive(Clone, Debug)]
struct ConnectionKey {
    current_user_id: String,
    target_user_id: String,
    token: Option<String>,
}

struct PendingReconnect {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

// Consolidated connection state behind one lock
#[derive(Default)]
struct SocketState {
    connecting: bool,
    open: bool,
    attempts: u32,
    last_error: Option<String>,
    writer: Option<WsWriter>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<PendingReconnect>,
    /// Bumped on every new connection attempt and on disconnect so stale
    /// reader tasks and late handshakes cannot touch superseded state.
    epoch: u64,
}

impl SocketState {
    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            pending.cancel.cancel();
            pending.handle.abort();
        }
    }
}

struct Shared {
    config: ChatConfig,
    inner: Mutex<SocketState>,
    message_listeners: ListenerRegistry<ChatMessage>,
    connection_listeners: ListenerRegistry<bool>,
}

/// Real-time chat transport for exactly one active conversation.
///
/// Maintains a WebSocket to the messaging backend, keyed by the current
/// user, the target user, and a connect-time snapshot of the access token.
/// Abnormal closures trigger automatic reconnection at a fixed interval up
/// to a configured bound; at most one reconnect is ever pending. Cloning
/// shares the underlying connection.
///
/// # Examples
///
/// ```no_run
/// use client::chat::{ChatSocket, MessageDraft};
/// use client::config::ChatConfig;
///
/// let socket = ChatSocket::new(ChatConfig::default());
///
/// let _on_message = socket.on_message(|message| {
///     println!("{}: {}", message.sender_name, message.content);
/// });
///
/// socket.connect("u1", "u2", Some(&token)).await?;
/// socket
///     .send_message(MessageDraft::text("hello", "u1", "Jane", "u2"))
///     .await;
/// ```
#[derive(Clone)]
pub struct ChatSocket {
    shared: Arc<Shared>,
}

impl ChatSocket {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(SocketState::default()),
                message_listeners: ListenerRegistry::new(),
                connection_listeners: ListenerRegistry::new(),
            }),
        }
    }

    /// Connects to the conversation channel.
    ///
    /// A no-op success when already connecting or open. An explicit connect
    /// re-arms the reconnect budget; only internal retries consume it.
    /// Resolves once the socket is open, fails on handshake error or after
    /// the configured connect timeout.
    pub async fn connect(
        &self,
        current_user_id: &str,
        target_user_id: &str,
        token: Option<&str>,
    ) -> Result<(), ChatError> {
        {
            let mut state = self.shared.inner.lock().await;
            if state.connecting || state.open {
                return Ok(());
            }
            state.attempts = 0;
        }

        let key = ConnectionKey {
            current_user_id: current_user_id.to_string(),
            target_user_id: target_user_id.to_string(),
            token: token.map(str::to_owned),
        };
        self.establish(key).await
    }

    /// Closes the connection with a normal-closure code and cancels any
    /// pending reconnect. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let writer = {
            let mut state = self.shared.inner.lock().await;
            state.cancel_reconnect();
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            state.epoch += 1;
            state.connecting = false;
            state.open = false;
            state.attempts = 0;
            state.writer.take()
        };

        if let Some(mut writer) = writer {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "Normal closure".into(),
            };
            if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                log::debug!("close frame not delivered: {e}");
            }
        }

        self.shared.connection_listeners.notify(&false);
    }

    /// Stamps and transmits a message on the open connection.
    ///
    /// Fire-and-forget: no delivery acknowledgement is awaited. Returns
    /// `false` (and logs) when the socket is not open or transmission
    /// fails.
    pub async fn send_message(&self, draft: MessageDraft) -> bool {
        let mut state = self.shared.inner.lock().await;
        let Some(writer) = state.writer.as_mut() else {
            log::error!("chat socket is not connected");
            return false;
        };

        let message = draft.into_message();
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("failed to serialize chat message: {e}");
                return false;
            }
        };

        match writer.send(Message::Text(payload)).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to send chat message: {e}");
                false
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.inner.lock().await.open
    }

    /// Snapshot of the current connection state.
    ///
    /// After the reconnect budget is exhausted this reports `attempting ==
    /// false`, `open == false` and `reconnect_attempts` equal to the
    /// configured maximum, which is the terminal give-up signal.
    pub async fn connection_state(&self) -> ConnectionState {
        let state = self.shared.inner.lock().await;
        ConnectionState {
            attempting: state.connecting || state.reconnect.is_some(),
            open: state.open,
            reconnect_attempts: state.attempts,
            last_error: state.last_error.clone(),
        }
    }

    /// Registers a listener for inbound messages.
    pub fn on_message(
        &self,
        listener: impl Fn(&ChatMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.message_listeners.subscribe(listener)
    }

    /// Registers a listener for connection-state changes (`true` on open,
    /// `false` on close).
    pub fn on_connection_change(
        &self,
        listener: impl Fn(&bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.connection_listeners.subscribe(listener)
    }

    fn connection_url(&self, key: &ConnectionKey) -> String {
        let mut url = format!(
            "{}/ws/chat?userId={}&targetUserId={}",
            self.shared.config.base_url.trim_end_matches('/'),
            key.current_user_id,
            key.target_user_id,
        );
        if let Some(token) = &key.token {
            url.push_str("&token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn establish(
        &self,
        key: ConnectionKey,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ChatError>> + Send + '_>>
    {
        Box::pin(async move {
        let epoch = {
            let mut state = self.shared.inner.lock().await;
            if state.connecting || state.open {
                return Ok(());
            }
            state.cancel_reconnect();
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            state.writer = None;
            state.connecting = true;
            state.epoch += 1;
            state.epoch
        };

        let url = self.connection_url(&key);
        log::debug!(
            "connecting chat socket for {} -> {}",
            key.current_user_id,
            key.target_user_id
        );

        let handshake =
            tokio::time::timeout(self.shared.config.connect_timeout, connect_async(url.as_str()))
                .await;
        match handshake {
            Ok(Ok((stream, _response))) => {
                let (writer, reader) = stream.split();
                {
                    let mut state = self.shared.inner.lock().await;
                    if state.epoch != epoch {
                        // Superseded by a disconnect or a newer connect
                        // while the handshake was in flight.
                        return Ok(());
                    }
                    state.connecting = false;
                    state.open = true;
                    state.attempts = 0;
                    state.last_error = None;
                    state.writer = Some(writer);

                    let socket = self.clone();
                    let reader_key = key.clone();
                    state.reader = Some(tokio::spawn(async move {
                        socket.read_loop(reader, reader_key, epoch).await;
                    }));
                }

                log::info!("chat socket connected");
                self.shared.connection_listeners.notify(&true);
                Ok(())
            }
            Ok(Err(e)) => {
                self.fail_attempt(epoch, key, e.to_string()).await;
                Err(ChatError::ConnectionFailed(e.to_string()))
            }
            Err(_elapsed) => {
                self.fail_attempt(epoch, key, "connection timeout".to_string())
                    .await;
                Err(ChatError::ConnectionTimeout)
            }
        }
        })
    }

    /// Records a failed connection attempt and schedules a retry while the
    /// budget lasts.
    async fn fail_attempt(&self, epoch: u64, key: ConnectionKey, reason: String) {
        let should_retry = {
            let mut state = self.shared.inner.lock().await;
            if state.epoch != epoch {
                return;
            }
            state.connecting = false;
            state.open = false;
            state.last_error = Some(reason.clone());
            state.attempts < self.shared.config.max_reconnect_attempts
        };

        log::warn!("chat connection attempt failed: {reason}");
        self.shared.connection_listeners.notify(&false);
        if should_retry {
            self.schedule_reconnect(key, epoch).await;
        }
    }

    async fn read_loop(&self, mut reader: WsReader, key: ConnectionKey, epoch: u64) {
        let mut close_code: Option<u16> = None;

        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => match ChatMessage::from_frame(&text) {
                    Some(message) => self.shared.message_listeners.notify(&message),
                    None => log::warn!("dropping malformed chat frame"),
                },
                Ok(Message::Close(frame)) => {
                    close_code = frame.map(|f| u16::from(f.code));
                    break;
                }
                // Ping/pong are handled by the protocol layer; binary
                // frames are not part of the chat protocol.
                Ok(_) => {}
                Err(e) => {
                    log::warn!("chat socket read error: {e}");
                    break;
                }
            }
        }

        self.handle_closure(close_code, key, epoch).await;
    }

    async fn handle_closure(&self, close_code: Option<u16>, key: ConnectionKey, epoch: u64) {
        let should_retry = {
            let mut state = self.shared.inner.lock().await;
            if state.epoch != epoch {
                return;
            }
            state.connecting = false;
            state.open = false;
            state.writer = None;
            state.reader = None;
            if close_code != Some(NORMAL_CLOSURE) {
                state.last_error = Some(match close_code {
                    Some(code) => format!("connection closed abnormally (code {code})"),
                    None => "connection dropped".to_string(),
                });
            }
            close_code != Some(NORMAL_CLOSURE)
                && state.attempts < self.shared.config.max_reconnect_attempts
        };

        log::info!("chat socket disconnected (code {close_code:?})");
        self.shared.connection_listeners.notify(&false);
        if should_retry {
            self.schedule_reconnect(key, epoch).await;
        }
    }

    /// Schedules a single reconnect attempt, replacing any pending one.
    async fn schedule_reconnect(&self, key: ConnectionKey, epoch: u64) {
        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        let socket = self.clone();
        let interval = self.shared.config.reconnect_interval;
        let max_attempts = self.shared.config.max_reconnect_attempts;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let attempt = {
                        let mut state = socket.shared.inner.lock().await;
                        state.reconnect = None;
                        if state.epoch != epoch {
                            // A disconnect or newer connect won the race.
                            return;
                        }
                        state.attempts += 1;
                        state.attempts
                    };
                    log::info!("attempting chat reconnect ({attempt}/{max_attempts})");
                    if let Err(e) = socket.establish(key).await {
                        log::warn!("chat reconnect failed: {e}");
                    }
                }
            }
        });

        let mut state = self.shared.inner.lock().await;
        state.cancel_reconnect();
        state.reconnect = Some(PendingReconnect { cancel, handle });
    }
}
