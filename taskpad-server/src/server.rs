//! Record store server core: shared state, WebSocket handler, and
//! request dispatch.
//!
//! The server accepts WebSocket connections and answers postcard-encoded
//! [`StoreRequest`] frames against the authoritative [`TaskTable`],
//! echoing each request's sequence number so clients can correlate
//! replies to in-flight operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use taskpad_proto::codec;
use taskpad_proto::store::{StoreOp, StoreReply, StoreRequest, StoreResult};

use crate::table::TaskTable;

/// Default maximum label length in characters.
const DEFAULT_MAX_LABEL_LEN: usize = 512;

/// Shared server state holding the task table and open connections.
pub struct ServerState {
    /// The authoritative `tasks` table.
    pub table: TaskTable,
    /// Maximum accepted label length in characters.
    max_label_len: usize,
    /// Writer channels of the open connections, keyed by connection id.
    connections: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Next connection id.
    next_conn_id: AtomicU64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates server state with an empty table and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_LABEL_LEN)
    }

    /// Creates server state with a custom label length limit.
    #[must_use]
    pub fn with_config(max_label_len: usize) -> Self {
        Self {
            table: TaskTable::new(),
            max_label_len,
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(0),
        }
    }

    /// Registers a connection's writer channel and returns its id.
    async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.write().await.insert(conn_id, sender);
        conn_id
    }

    /// Removes a connection from the registry.
    async fn unregister(&self, conn_id: u64) {
        self.connections.write().await.remove(&conn_id);
    }

    /// Send a WebSocket Close frame to all connected clients.
    ///
    /// Each client's writer task sends the close frame, which the
    /// client-side reader observes as a lost connection. Useful for
    /// graceful shutdown and testing.
    pub async fn close_all_connections(&self) {
        let connections = self.connections.read().await;
        for (conn_id, sender) in connections.iter() {
            tracing::info!(conn_id, "sending close frame to client");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// Requests are processed in arrival order and each reply carries the
/// request's sequence number. Malformed frames are logged and skipped —
/// without a sequence number there is nothing useful to answer.
pub async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer channel, so shutdown can push a Close frame to the client.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = state.register(tx.clone()).await;
    tracing::debug!(conn_id, "client connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    let request = match codec::decode_request(&data) {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(conn_id, error = %e, "malformed request frame, skipping");
                            continue;
                        }
                    };

                    let reply = StoreReply {
                        seq: request.seq,
                        result: apply_op(&reader_state, request.op).await,
                    };
                    match codec::encode_reply(&reply) {
                        Ok(bytes) => {
                            if tx.send(Message::Binary(bytes.into())).is_err() {
                                // Writer task is gone.
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(conn_id, error = %e, "failed to encode reply");
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::debug!(conn_id, "client sent close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(conn_id).await;
    tracing::debug!(conn_id, "client disconnected");
}

/// Applies one operation to the table and builds the result.
async fn apply_op(state: &Arc<ServerState>, op: StoreOp) -> StoreResult {
    match op {
        StoreOp::ListTasks => StoreResult::Rows(state.table.list_desc().await),
        StoreOp::InsertTask { draft } => {
            if let Err(reason) = check_label_length(state, &draft.label) {
                return StoreResult::Failed(reason);
            }
            match state.table.insert(draft).await {
                Ok(task) => {
                    tracing::debug!(task_id = %task.id, "inserted task");
                    StoreResult::Inserted(task)
                }
                Err(e) => StoreResult::Failed(e.to_string()),
            }
        }
        StoreOp::SetDone { id, done } => {
            let affected = state.table.set_done(&id, done).await;
            tracing::debug!(task_id = %id, done, affected, "set done");
            StoreResult::Affected(affected)
        }
        StoreOp::SetLabel {
            id,
            label,
            updated_at,
        } => {
            if let Err(reason) = check_label_length(state, &label) {
                return StoreResult::Failed(reason);
            }
            match state.table.set_label(&id, &label, updated_at).await {
                Ok(affected) => {
                    tracing::debug!(task_id = %id, affected, "set label");
                    StoreResult::Affected(affected)
                }
                Err(e) => StoreResult::Failed(e.to_string()),
            }
        }
        StoreOp::DeleteTask { id } => {
            let affected = state.table.delete(&id).await;
            tracing::debug!(task_id = %id, affected, "deleted task");
            StoreResult::Affected(affected)
        }
    }
}

/// Rejects labels beyond the configured character limit.
fn check_label_length(state: &Arc<ServerState>, label: &str) -> Result<(), String> {
    let len = label.chars().count();
    if len > state.max_label_len {
        tracing::warn!(len, max = state.max_label_len, "label exceeds length limit");
        Err(format!(
            "label too long: {len} characters (max {})",
            state.max_label_len
        ))
    } else {
        Ok(())
    }
}

/// Starts the server on the given address and returns the bound address
/// and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the server with a pre-configured [`ServerState`].
///
/// Use [`ServerState::with_config`] to create a state with custom
/// limits from the resolved [`crate::config::ServerConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "record store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
