//! SceneSync Document Store Server
//!
//! Keeps one JSON record per scene and pushes every write to the scene's
//! subscribers, including the client that wrote it.
//!
//! ## HTTP
//!
//! - `GET /scenes/{id}` returns the record, or 404 when it was never written
//! - `PUT /scenes/{id}` merges a JSON object into the record
//!
//! ## WebSocket protocol (`/ws`)
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "get", "request_id": 1, "scene_id": "abc" }
//! { "type": "put", "request_id": 2, "scene_id": "abc", "record": { "canvasState": "..." } }
//! { "type": "subscribe", "scene_id": "abc" }
//! { "type": "unsubscribe", "scene_id": "abc" }
//! ```

mod config;
mod store;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use config::ServerConfig;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use scenesync_core::protocol::{ClientMessage, SceneRecord, ServerMessage};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use store::{SceneStore, StoreError};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shared application state
type AppState = Arc<SceneStore>;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenesync_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let store = match &config.data_dir {
        Some(dir) => match SceneStore::with_data_dir(dir) {
            Ok(store) => {
                info!("Persisting scenes to {}", dir.display());
                store
            }
            Err(e) => {
                warn!("{}; keeping scenes in memory", e);
                SceneStore::in_memory()
            }
        },
        None => {
            info!("Keeping scenes in memory");
            SceneStore::in_memory()
        }
    };

    let app = router(Arc::new(store));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("SceneSync store listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);
    axum::serve(listener, app).await
}

fn router(store: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/scenes/{id}", get(get_scene).put(put_scene))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(store)
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            StoreError::Io(_) | StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Index page
async fn index() -> &'static str {
    "SceneSync Document Store - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn get_scene(
    State(store): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StoreError> {
    match store.get(&id)? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok((StatusCode::NOT_FOUND, format!("Scene {} not found", id)).into_response()),
    }
}

async fn put_scene(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<SceneRecord>, StoreError> {
    let Value::Object(patch) = body else {
        return Err(StoreError::InvalidRecord("expected a JSON object".to_string()));
    };
    Ok(Json(store.put(&id, patch)?))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(store): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, store))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, store: AppState) {
    let conn_id = Uuid::new_v4().to_string();
    info!("New connection: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        let outgoing = tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(request) => handle_request(&store, request, &conn_id, &push_tx, &mut subscriptions),
                    Err(e) => {
                        warn!("Invalid message from {}: {}", conn_id, e);
                        Some(ServerMessage::Error {
                            request_id: None,
                            message: format!("Invalid message: {}", e),
                        })
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None, // Ignore binary/ping/pong
                Some(Err(e)) => {
                    warn!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            },

            // Changes on subscribed scenes
            push = push_rx.recv() => push,
        };

        if let Some(message) = outgoing {
            if send_json(&mut sender, &message).await.is_err() {
                break;
            }
        }
    }

    for (_, task) in subscriptions {
        task.abort();
    }
    info!("Connection closed: {}", conn_id);
}

/// Answer one client message. Returns the direct reply, if any.
fn handle_request(
    store: &SceneStore,
    request: ClientMessage,
    conn_id: &str,
    push_tx: &mpsc::UnboundedSender<ServerMessage>,
    subscriptions: &mut HashMap<String, JoinHandle<()>>,
) -> Option<ServerMessage> {
    match request {
        ClientMessage::Get {
            request_id,
            scene_id,
        } => Some(match store.get(&scene_id) {
            Ok(record) => ServerMessage::Record {
                request_id,
                scene_id,
                record,
            },
            Err(e) => ServerMessage::Error {
                request_id: Some(request_id),
                message: e.to_string(),
            },
        }),
        ClientMessage::Put {
            request_id,
            scene_id,
            record,
        } => Some(match store.put_record(&scene_id, &record) {
            Ok(stored) => ServerMessage::PutAck {
                request_id,
                scene_id,
                last_modified: stored.last_modified,
            },
            Err(e) => {
                warn!("Write to {} from {} failed: {}", scene_id, conn_id, e);
                ServerMessage::Error {
                    request_id: Some(request_id),
                    message: e.to_string(),
                }
            }
        }),
        ClientMessage::Subscribe { scene_id } => {
            if !subscriptions.contains_key(&scene_id) {
                let task = forward(store.subscribe(&scene_id), push_tx.clone());
                subscriptions.insert(scene_id.clone(), task);
                debug!("{} subscribed to {}", conn_id, scene_id);
            }
            None
        }
        ClientMessage::Unsubscribe { scene_id } => {
            if let Some(task) = subscriptions.remove(&scene_id) {
                task.abort();
                debug!("{} unsubscribed from {}", conn_id, scene_id);
            }
            None
        }
    }
}

/// Relay a scene's change channel into one connection's outbox.
fn forward(
    mut rx: broadcast::Receiver<ServerMessage>,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, {} change(s) dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to encode {:?}: {}", message, e);
            Ok(())
        }
    }
}
