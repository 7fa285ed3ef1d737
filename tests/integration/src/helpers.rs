//! Test helpers for integration tests
//!
//! Spawns a relay server on an ephemeral port and wraps a
//! `tokio-tungstenite` client in an event-level API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use relay_common::AppConfig;
use relay_gateway::connection::ConnectionManager;
use relay_gateway::{create_app, RelayState};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// How long to wait for an expected event
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait before declaring a connection silent
const SILENCE_WINDOW: Duration = Duration::from_millis(300);

/// Relay server instance for tests
///
/// Keeps a handle to the connection manager so tests can assert on
/// presence and room state directly.
pub struct TestServer {
    pub addr: SocketAddr,
    pub manager: Arc<ConnectionManager>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a relay on an ephemeral port
    pub async fn start() -> Result<Self> {
        let manager = ConnectionManager::new_shared();
        let state = RelayState::new(manager.clone(), AppConfig::default());
        let app = create_app(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Give the accept loop a moment
        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(Self {
            addr,
            manager,
            _handle: handle,
        })
    }

    /// WebSocket URL of the relay endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }

    /// HTTP base URL
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// A WebSocket client speaking the relay's event protocol
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connect a new client to the server
    pub async fn connect(server: &TestServer) -> Result<Self> {
        let (stream, _response) = connect_async(server.ws_url()).await?;
        Ok(Self { stream })
    }

    /// Send a raw text frame
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send an `{"event": ..., "data": ...}` frame
    pub async fn emit(&mut self, event: &str, data: Value) -> Result<()> {
        self.send_raw(&json!({"event": event, "data": data}).to_string())
            .await
    }

    /// Receive the next text frame as JSON
    pub async fn recv(&mut self) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;

        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| anyhow!("Timed out waiting for an event"))?;

            let msg = timeout(remaining, self.stream.next())
                .await
                .map_err(|_| anyhow!("Timed out waiting for an event"))?
                .ok_or_else(|| anyhow!("Connection closed while waiting for an event"))??;

            match msg {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                // Skip transport-level frames
                Message::Ping(_) | Message::Pong(_) => {}
                other => bail!("Unexpected frame: {other:?}"),
            }
        }
    }

    /// Receive the next event and assert its name, returning its data
    pub async fn recv_event(&mut self, expected: &str) -> Result<Value> {
        let mut frame = self.recv().await?;
        let event = frame
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Frame without an event name: {frame}"))?;

        if event != expected {
            bail!("Expected event {expected}, got {event}");
        }

        Ok(frame
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Assert that no event arrives within the silence window
    pub async fn assert_silent(&mut self) -> Result<()> {
        match timeout(SILENCE_WINDOW, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(None) => Ok(()),
            Ok(Some(msg)) => bail!("Expected silence, got {msg:?}"),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await.ok();
        Ok(())
    }
}

/// Let in-flight frames land on the server before proceeding
///
/// The relay guarantees FIFO per connection but nothing across
/// connections, so tests pause between cross-connection steps.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
