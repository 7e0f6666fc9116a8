use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use huddle_core::protocol::{ClientEvent, ServerEvent, decode_server_event, encode_client_event};

use huddle_server::build_app;
use huddle_server::config::HuddleConfig;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default configuration and no access code.
    pub async fn new() -> Self {
        Self::from_config(HuddleConfig::default()).await
    }

    pub async fn with_access_code(code: &str) -> Self {
        let config = HuddleConfig {
            access_code: Some(code.to_string()),
            ..HuddleConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: HuddleConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        huddle_server::spawn_room_reaper(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsClient {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send one client event as a JSON text frame.
pub async fn ws_send(stream: &mut WsClient, event: &ClientEvent) {
    let encoded = encode_client_event(event).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Read the next server event, skipping non-text frames.
pub async fn ws_read(stream: &mut WsClient) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for server event")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return decode_server_event(text.as_str()).unwrap();
        }
    }
}

/// Read server events until one matches, panicking after `limit` frames.
/// Tick broadcasts interleave with everything else, so most assertions
/// need to skim past state updates.
pub async fn ws_read_until<F>(stream: &mut WsClient, limit: usize, mut pred: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    for _ in 0..limit {
        let event = ws_read(stream).await;
        if pred(&event) {
            return event;
        }
    }
    panic!("no matching event within {limit} frames");
}
