#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{
        Path, Query,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, Uri, header::AUTHORIZATION},
    routing::{get, post},
};
use bookmux::rpc::{RequestEnvelope, ResponseEnvelope};
use bookmux_tokio_rpc_client::ClientConfig;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::TcpListener,
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::timeout,
};

pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const GOOD_CODE: &str = "good-code";
pub const ISSUED_TOKEN: &str = "tkn-123";

/// What the client sent when opening the stream.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
}

enum Command {
    Send(String),
    Close,
}

/// In-process stand-in for the bookmark server.
///
/// Requests arriving on the stream are handed to the test, which answers them
/// explicitly and in whatever order it likes.
pub struct MockServer {
    pub server: String,
    handshakes: mpsc::UnboundedReceiver<Handshake>,
    requests: mpsc::UnboundedReceiver<RequestEnvelope>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let (handshake_tx, handshakes) = mpsc::unbounded_channel::<Handshake>();
        let (request_tx, requests) = mpsc::unbounded_channel::<RequestEnvelope>();
        let (commands, command_rx) = mpsc::unbounded_channel::<Command>();
        // One socket at a time drives the commands; a replacement connection
        // takes over once the previous one is gone.
        let command_rx = Arc::new(Mutex::new(command_rx));

        let app = Router::new()
            .route(
                "/api/my/wsconnect",
                get(
                    move |ws: WebSocketUpgrade, uri: Uri, headers: HeaderMap| async move {
                        let authorization = headers
                            .get(AUTHORIZATION)
                            .and_then(|value| value.to_str().ok())
                            .map(String::from);
                        let _ = handshake_tx.send(Handshake {
                            uri: uri.to_string(),
                            authorization,
                        });

                        ws.on_upgrade(move |socket| serve_socket(socket, request_tx, command_rx))
                    },
                ),
            )
            .route("/api/auth/{provider}/client_id", get(client_id))
            .route("/api/auth/{provider}/authenticate", post(authenticate));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            server: addr.to_string(),
            handshakes,
            requests,
            commands,
            task,
        }
    }

    /// Client configuration pointing at this server, without artificial delay.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.server.clone()).with_artificial_delay(Duration::ZERO)
    }

    pub async fn next_handshake(&mut self) -> Handshake {
        timeout(Duration::from_secs(2), self.handshakes.recv())
            .await
            .expect("timed out waiting for a handshake")
            .expect("handshake channel closed")
    }

    pub async fn next_request(&mut self) -> RequestEnvelope {
        timeout(Duration::from_secs(2), self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("request channel closed")
    }

    pub fn respond(&self, id: u32, status: u16, body: Value) {
        let text = ResponseEnvelope::new(id, status, body).to_json().unwrap();
        self.send_raw(text);
    }

    pub fn send_raw(&self, text: impl Into<String>) {
        self.commands.send(Command::Send(text.into())).unwrap();
    }

    /// Closes the current socket from the server side.
    pub fn close_socket(&self) {
        self.commands.send(Command::Close).unwrap();
    }

    /// Takes the next request and answers it.
    pub async fn answer(&mut self, status: u16, body: Value) -> RequestEnvelope {
        let request = self.next_request().await;
        self.respond(request.id, status, body);
        request
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_socket(
    mut socket: WebSocket,
    requests: mpsc::UnboundedSender<RequestEnvelope>,
    commands: Arc<Mutex<mpsc::UnboundedReceiver<Command>>>,
) {
    let mut commands = commands.lock().await;

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let envelope = RequestEnvelope::from_json(text.as_str()).unwrap();
                    let _ = requests.send(envelope);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

async fn client_id(Path(provider): Path<String>) -> (StatusCode, Json<Value>) {
    match provider.as_str() {
        "google" => (StatusCode::OK, Json(json!({ "clientID": TEST_CLIENT_ID }))),
        other => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": 400,
                "message": format!("unknown auth provider: {other:?}"),
            })),
        ),
    }
}

async fn authenticate(
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let code = params.get("code").map(String::as_str);
    let redirect_uri = params.get("redirect_uri").cloned().unwrap_or_default();

    match (provider.as_str(), code) {
        ("google", Some(GOOD_CODE)) => (
            StatusCode::OK,
            Json(json!({ "token": ISSUED_TOKEN, "redirectURI": redirect_uri })),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": 401, "message": "bad code" })),
        ),
    }
}
