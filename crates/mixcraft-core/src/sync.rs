//! WebSocket transport to the game server.
//!
//! Provides a platform-agnostic client that reconnects on its own and hands
//! every event to the host through `poll_events()`. Nothing here touches the
//! session; the host pumps events into it on its own thread.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection was ever attempted.
    #[default]
    NotConnected,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    /// Short label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected (or reconnected) to the server
    Connected,
    /// Connection lost or closed
    Disconnected,
    /// Waiting before the next connection attempt
    Reconnecting { attempt: u32, delay: Duration },
    /// Text frame received
    Message(String),
    /// Error occurred
    Error { message: String },
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Failed to create WebSocket: {0}")]
    Create(String),
}

/// Backoff schedule for automatic reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts after a loss before giving up.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 3000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based), or `None` once attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u64 << (attempt - 1).min(32);
        let ms = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(ms))
    }
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};
    use web_time::Instant;

    /// WebSocket client for WASM.
    ///
    /// Events are collected by the socket callbacks and must be polled via
    /// `poll_events()`, which also fires scheduled reconnects.
    pub struct WasmWebSocket {
        ws: Option<WebSocket>,
        url: Option<String>,
        policy: ReconnectPolicy,
        state: ConnectionState,
        attempt: u32,
        retry_at: Option<Instant>,
        events: Rc<RefCell<Vec<SyncEvent>>>,
        // Store closures to prevent them from being dropped
        _on_open: Option<Closure<dyn Fn()>>,
        _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
        _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
        _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
    }

    impl WasmWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new(policy: ReconnectPolicy) -> Self {
            Self {
                ws: None,
                url: None,
                policy,
                state: ConnectionState::NotConnected,
                attempt: 0,
                retry_at: None,
                events: Rc::new(RefCell::new(Vec::new())),
                _on_open: None,
                _on_message: None,
                _on_close: None,
                _on_error: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.url.is_some() {
                return Err(TransportError::AlreadyConnected);
            }
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(TransportError::InvalidUrl(url.to_string()));
            }
            self.url = Some(url.to_string());
            self.open()
        }

        fn open(&mut self) -> Result<(), TransportError> {
            let Some(url) = self.url.clone() else {
                return Err(TransportError::NotConnected);
            };
            let ws = WebSocket::new(&url).map_err(|e| TransportError::Create(format!("{:?}", e)))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

            self.state = ConnectionState::Connecting;
            let events = self.events.clone();

            // onopen
            let events_open = events.clone();
            let on_open = Closure::wrap(Box::new(move || {
                events_open.borrow_mut().push(SyncEvent::Connected);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            // onmessage
            let events_msg = events.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                    events_msg.borrow_mut().push(SyncEvent::Message(txt.into()));
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            // onclose
            let events_close = events.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                events_close.borrow_mut().push(SyncEvent::Disconnected);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            // onerror
            let events_err = events;
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                events_err.borrow_mut().push(SyncEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self._on_open = Some(on_open);
            self._on_message = Some(on_message);
            self._on_close = Some(on_close);
            self._on_error = Some(on_error);

            Ok(())
        }

        fn drop_socket(&mut self) {
            if let Some(ws) = self.ws.take() {
                ws.set_onclose(None);
                let _ = ws.close();
            }
            self._on_open = None;
            self._on_message = None;
            self._on_close = None;
            self._on_error = None;
        }

        /// Disconnect from the server and stop reconnecting.
        pub fn disconnect(&mut self) {
            self.drop_socket();
            self.url = None;
            self.retry_at = None;
            self.attempt = 0;
            self.state = ConnectionState::Disconnected;
        }

        /// Send a text message.
        pub fn send(&self, msg: &str) -> Result<(), TransportError> {
            match &self.ws {
                Some(ws) if self.state == ConnectionState::Connected => {
                    ws.send_with_str(msg).map_err(|e| TransportError::Send(format!("{:?}", e)))
                }
                _ => Err(TransportError::NotConnected),
            }
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let drained = std::mem::take(&mut *self.events.borrow_mut());
            let mut out = Vec::with_capacity(drained.len());

            for event in drained {
                match &event {
                    SyncEvent::Connected => {
                        self.state = ConnectionState::Connected;
                        self.attempt = 0;
                    }
                    SyncEvent::Disconnected => {
                        self.state = ConnectionState::Disconnected;
                        self.drop_socket();
                        out.push(event);
                        self.schedule_retry(&mut out);
                        continue;
                    }
                    _ => {}
                }
                out.push(event);
            }

            if self.retry_at.is_some_and(|at| Instant::now() >= at) {
                self.retry_at = None;
                if let Err(e) = self.open() {
                    log::error!("Reconnect failed: {}", e);
                    out.push(SyncEvent::Error { message: e.to_string() });
                    self.schedule_retry(&mut out);
                }
            }
            out
        }

        fn schedule_retry(&mut self, out: &mut Vec<SyncEvent>) {
            if self.url.is_none() {
                return;
            }
            self.attempt += 1;
            match self.policy.delay_for(self.attempt) {
                Some(delay) => {
                    self.retry_at = Some(Instant::now() + delay);
                    out.push(SyncEvent::Reconnecting { attempt: self.attempt, delay });
                }
                None => {
                    log::warn!("Giving up after {} reconnect attempts", self.attempt - 1);
                    self.url = None;
                }
            }
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for WasmWebSocket {
        fn default() -> Self {
            Self::new(ReconnectPolicy::default())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{connect, Message, WebSocket};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Why the read loop ended.
    enum LoopExit {
        /// Close requested by the owner.
        Closed,
        /// Connection lost; try again.
        Lost,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation. The thread
    /// reconnects on its own according to the [`ReconnectPolicy`].
    pub struct NativeWebSocket {
        policy: ReconnectPolicy,
        state: ConnectionState,
        events: Vec<SyncEvent>,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new(policy: ReconnectPolicy) -> Self {
            Self {
                policy,
                state: ConnectionState::NotConnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.cmd_tx.is_some() {
                return Err(TransportError::AlreadyConnected);
            }

            // Validate URL
            let parsed_url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();
            let policy = self.policy;
            let handle = thread::spawn(move || run(&url, policy, &cmd_rx, &event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server and stop reconnecting.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Send a text message. Messages are not queued while disconnected.
        pub fn send(&self, msg: &str) -> Result<(), TransportError> {
            if self.state != ConnectionState::Connected {
                return Err(TransportError::NotConnected);
            }
            match &self.cmd_tx {
                Some(tx) => tx
                    .send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| TransportError::Send(e.to_string())),
                None => Err(TransportError::NotConnected),
            }
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            // Drain events from channel
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    // Update state based on event
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected | SyncEvent::Error { .. } => {
                            self.state = ConnectionState::Disconnected
                        }
                        SyncEvent::Reconnecting { .. } => self.state = ConnectionState::Connecting,
                        SyncEvent::Message(_) => {}
                    }
                    self.events.push(event);
                }
            }

            std::mem::take(&mut self.events)
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new(ReconnectPolicy::default())
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Body of the WebSocket thread: connect, pump, back off, repeat.
    fn run(url: &str, policy: ReconnectPolicy, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<SyncEvent>) {
        let mut attempt = 0;
        loop {
            log::info!("WebSocket thread: connecting to {}", url);
            match connect(url) {
                Ok((mut socket, response)) => {
                    log::info!("WebSocket connected, status: {}", response.status());
                    attempt = 0;
                    let _ = event_tx.send(SyncEvent::Connected);
                    set_timeouts(&mut socket);

                    let exit = pump(&mut socket, cmd_rx, event_tx);
                    let _ = event_tx.send(SyncEvent::Disconnected);
                    if let LoopExit::Closed = exit {
                        log::info!("WebSocket thread exiting");
                        return;
                    }
                }
                Err(e) => {
                    log::error!("WebSocket connection failed: {}", e);
                    let _ = event_tx.send(SyncEvent::Error {
                        message: format!("Connection failed: {}", e),
                    });
                }
            }

            attempt += 1;
            let Some(delay) = policy.delay_for(attempt) else {
                log::warn!("Giving up after {} reconnect attempts", attempt - 1);
                return;
            };
            if event_tx.send(SyncEvent::Reconnecting { attempt, delay }).is_err() {
                return;
            }
            if !wait(cmd_rx, delay) {
                log::info!("WebSocket thread exiting");
                return;
            }
        }
    }

    /// Sleep for `delay`, returning false if a close arrived meanwhile.
    fn wait(cmd_rx: &Receiver<WsCommand>, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match cmd_rx.recv_timeout(left) {
                Ok(WsCommand::Send(_)) => log::debug!("Dropping message sent while disconnected"),
                Ok(WsCommand::Close) | Err(RecvTimeoutError::Disconnected) => return false,
                Err(RecvTimeoutError::Timeout) => return true,
            }
        }
    }

    /// Set read timeout on the underlying TCP stream for non-blocking behavior.
    fn set_timeouts(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
        match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => {
                // For TLS streams, we'll rely on WouldBlock/TimedOut errors
                log::debug!("TLS or other stream - using default timeout handling");
            }
        }
    }

    fn pump(
        socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
        cmd_rx: &Receiver<WsCommand>,
        event_tx: &Sender<SyncEvent>,
    ) -> LoopExit {
        loop {
            // Check for commands (non-blocking)
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", msg);
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        return LoopExit::Lost;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    return LoopExit::Closed;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    return LoopExit::Closed;
                }
                Err(TryRecvError::Empty) => {}
            }

            // Check for incoming messages (with timeout)
            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", txt);
                    if event_tx.send(SyncEvent::Message(txt)).is_err() {
                        return LoopExit::Closed;
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    return LoopExit::Lost;
                }
                Ok(_) => {} // Ignore binary, pong
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    return LoopExit::Lost;
                }
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

// ============================================================================
// Platform type alias
// ============================================================================

/// Platform-specific WebSocket client type.
#[cfg(target_arch = "wasm32")]
pub type PlatformWebSocket = WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformWebSocket = NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(10), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(11), None);
    }

    #[test]
    fn test_backoff_large_attempts_do_not_overflow() {
        let policy = ReconnectPolicy { max_attempts: u32::MAX, initial_delay_ms: 1000, max_delay_ms: 60_000 };
        assert_eq!(policy.delay_for(100), Some(Duration::from_millis(60_000)));
    }

    #[test]
    fn test_policy_partial_json() {
        let policy: ReconnectPolicy = serde_json::from_str(r#"{"max_attempts":3}"#).unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 3000);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_rejects_bad_urls() {
        let mut ws = NativeWebSocket::default();
        assert!(matches!(ws.connect("not a url"), Err(TransportError::InvalidUrl(_))));
        assert!(matches!(ws.connect("http://localhost:1"), Err(TransportError::InvalidUrl(_))));
        assert_eq!(ws.state(), ConnectionState::NotConnected);
        assert_eq!(ws.send("{}"), Err(TransportError::NotConnected));
    }
}
