// ABOUTME: WebSocket transport session for interactive terminal I/O
// Manages the duplex channel lifecycle, receive loop, and orderly teardown

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::ClientError;

use super::protocol::{ResizeCommand, SessionState, TerminalEvent};

/// Bounded wait for the receive loop to exit during close.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// One duplex channel to a running container's terminal.
///
/// The bearer credential travels as a connection header, never in the URL.
/// After `connect`, a receive loop forwards incoming frames as
/// [`TerminalEvent`]s which the caller drains via `next_event`.
pub struct TerminalSession {
    url: String,
    token: String,
    state: Arc<RwLock<SessionState>>,
    sink: Arc<Mutex<Option<WsSink>>>,
    events_tx: mpsc::UnboundedSender<TerminalEvent>,
    events_rx: Arc<Mutex<mpsc::UnboundedReceiver<TerminalEvent>>>,
    cancel: Arc<StdMutex<Option<watch::Sender<bool>>>>,
    recv_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TerminalSession {
    /// Build an unconnected session for a container's terminal endpoint.
    /// Fails fast when no credential is configured.
    pub fn new(
        api: &ApiClient,
        container_id: &str,
        cols: u16,
        rows: u16,
    ) -> Result<Self, ClientError> {
        let token = api
            .token()
            .ok_or(ClientError::NotAuthenticated)?
            .to_string();
        let url = api.ws_url(&format!("/ws/terminal/{container_id}?cols={cols}&rows={rows}"));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            url,
            token,
            state: Arc::new(RwLock::new(SessionState::Connecting)),
            sink: Arc::new(Mutex::new(None)),
            events_tx,
            events_rx: Arc::new(Mutex::new(events_rx)),
            cancel: Arc::new(StdMutex::new(None)),
            recv_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Connect and immediately start the receive loop.
    pub async fn open(
        api: &ApiClient,
        container_id: &str,
        cols: u16,
        rows: u16,
    ) -> Result<Self, ClientError> {
        let session = Self::new(api, container_id, cols, rows)?;
        session.connect().await?;
        Ok(session)
    }

    /// Establish the WebSocket connection. A no-op when already open.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if *self.state.read().await == SessionState::Open {
            return Ok(());
        }
        *self.state.write().await = SessionState::Connecting;

        let mut request = self.url.as_str().into_client_request()?;
        let credential = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ClientError::NotAuthenticated)?;
        request.headers_mut().insert(AUTHORIZATION, credential);

        debug!(url = %self.url, "connecting terminal websocket");
        let (ws_stream, _response) = match connect_async(request).await {
            Ok(connected) => connected,
            Err(err) => {
                *self.state.write().await = SessionState::Closed;
                return Err(ClientError::WebSocket(err));
            }
        };
        info!(url = %self.url, "terminal websocket connected");

        let (ws_sink, ws_source) = ws_stream.split();
        *self.sink.lock().await = Some(ws_sink);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *lock(&self.cancel) = Some(cancel_tx);

        *self.state.write().await = SessionState::Open;

        let handle = tokio::spawn(receive_loop(
            ws_source,
            cancel_rx,
            self.events_tx.clone(),
            Arc::clone(&self.state),
        ));
        *self.recv_task.lock().await = Some(handle);

        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == SessionState::Open
    }

    /// Next event from the receive loop. Intended for a single consumer.
    pub async fn next_event(&self) -> Option<TerminalEvent> {
        let mut events = self.events_rx.lock().await;
        events.recv().await
    }

    /// Send keystrokes as a text frame. Silently does nothing unless the
    /// session is open, so callers never have to guard teardown races.
    pub async fn write(&self, data: &str) -> Result<(), ClientError> {
        self.send(Message::Text(data.to_string())).await
    }

    /// Send raw bytes as a binary frame. Same no-op contract as `write`.
    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), ClientError> {
        self.send(Message::Binary(data.to_vec())).await
    }

    /// Resize the remote terminal via the JSON control message.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), ClientError> {
        let command = serde_json::to_string(&ResizeCommand::new(cols, rows))?;
        debug!(cols, rows, "sending resize control message");
        self.send(Message::Text(command)).await
    }

    async fn send(&self, message: Message) -> Result<(), ClientError> {
        if *self.state.read().await != SessionState::Open {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        if let Some(sink) = sink.as_mut() {
            sink.send(message).await?;
        }
        Ok(())
    }

    /// Tear the session down. Safe to call repeatedly and from any state:
    /// cancels the receive loop, attempts a graceful peer close, waits a
    /// bounded time for the loop to exit, and always emits one `Closed`
    /// event for this invocation.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Closed {
                *state = SessionState::Closing;
            }
        }

        if let Some(cancel) = lock(&self.cancel).take() {
            let _ = cancel.send(true);
        }

        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(err) = sink.send(Message::Close(None)).await {
                debug!("close frame not delivered: {err}");
            }
        }

        if let Some(handle) = self.recv_task.lock().await.take() {
            if timeout(CLOSE_GRACE, handle).await.is_err() {
                warn!("receive loop did not exit within the close grace period");
            }
        }

        *self.state.write().await = SessionState::Closed;
        let _ = self.events_tx.send(TerminalEvent::Closed);
    }
}

/// Forward frames until the peer closes, an error occurs, or cancellation
/// is signaled. Always emits `Closed` last, exactly once per loop exit.
async fn receive_loop(
    mut source: WsSource,
    mut cancel: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<TerminalEvent>,
    state: Arc<RwLock<SessionState>>,
) {
    loop {
        tokio::select! {
            // Deliberate cancellation (or the session being dropped): no
            // error event on this path.
            _ = cancel.changed() => {
                debug!("receive loop cancelled");
                break;
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TerminalEvent::Data(text)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if events.send(TerminalEvent::Binary(data)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("terminal closed by peer");
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/Pong handled by the library.
                }
                Some(Err(err)) => {
                    warn!("terminal websocket error: {err}");
                    let _ = events.send(TerminalEvent::Error(err.to_string()));
                    break;
                }
                None => break,
            }
        }
    }

    *state.write().await = SessionState::Closed;
    let _ = events.send(TerminalEvent::Closed);
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
