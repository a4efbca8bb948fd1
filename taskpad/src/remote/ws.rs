//! WebSocket implementation of [`RecordStore`].
//!
//! Connects to a `taskpad-server` instance and exchanges postcard-encoded
//! request/reply frames. A background reader task resolves replies to
//! their waiting callers by sequence number, so several operations can
//! be in flight on one connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskpad_proto::codec;
use taskpad_proto::store::{StoreOp, StoreRequest, StoreResult};
use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp};

use super::{RecordStore, RecordStoreError};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Replies not yet claimed by a caller, keyed by request sequence.
type PendingReplies = Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<StoreResult>>>>;

/// Default timeout for connecting to the record store service.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single request/reply round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket-backed record store client.
///
/// Created via [`RemoteRecordStore::connect`], which establishes the
/// connection and spawns a background reader task that routes reply
/// frames to their waiting requests.
pub struct RemoteRecordStore {
    /// The service URL (ws:// or wss://).
    url: String,
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Mutex<WsSender>,
    /// Replies awaited by in-flight requests.
    pending: PendingReplies,
    /// Next request sequence number.
    next_seq: AtomicU64,
    /// Whether the connection is still believed to be up.
    connected: Arc<AtomicBool>,
    /// Timeout for a single request/reply round trip.
    request_timeout: Duration,
    /// Handle to the background reader task (kept alive for the client's lifetime).
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteRecordStore {
    /// Connect to a record store service with default timeouts.
    ///
    /// # Errors
    ///
    /// See [`connect_with`](Self::connect_with).
    pub async fn connect(url: &str) -> Result<Self, RecordStoreError> {
        Self::connect_with(url, CONNECT_TIMEOUT, REQUEST_TIMEOUT).await
    }

    /// Connect to a record store service with explicit timeouts.
    ///
    /// # Errors
    ///
    /// - [`RecordStoreError::Timeout`] if the connection attempt times out.
    /// - [`RecordStoreError::Io`] if the URL is invalid or the WebSocket
    ///   handshake fails.
    pub async fn connect_with(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RecordStoreError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RecordStoreError::Io(std::io::Error::other(format!("bad URL: {e}"))))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RecordStoreError::Io(std::io::Error::other(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            ))));
        }

        let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "record store connect timed out");
                RecordStoreError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, err = %e, "record store connect failed");
                RecordStoreError::Io(std::io::Error::other(format!("connect failed: {e}")))
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let pending: PendingReplies = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        tracing::info!(url, "connected to record store");

        Ok(Self {
            url: url.to_string(),
            ws_sender: Mutex::new(ws_sender),
            pending,
            next_seq: AtomicU64::new(0),
            connected,
            request_timeout,
            _reader_handle: reader_handle,
        })
    }

    /// Return the service URL this client is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the connection is still believed to be up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Send one operation and wait for its correlated reply.
    async fn request(&self, op: StoreOp) -> Result<StoreResult, RecordStoreError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(RecordStoreError::ConnectionClosed);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(seq, tx);

        let request = StoreRequest { seq, op };
        let bytes = match codec::encode_request(&request) {
            Ok(b) => b,
            Err(e) => {
                self.pending.lock().remove(&seq);
                return Err(e.into());
            }
        };

        {
            let mut sender = self.ws_sender.lock().await;
            if let Err(e) = sender.send(Message::Binary(bytes.into())).await {
                tracing::warn!(err = %e, "record store send failed");
                self.connected.store(false, Ordering::Relaxed);
                self.pending.lock().remove(&seq);
                return Err(RecordStoreError::ConnectionClosed);
            }
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            // Reader task dropped the sender: connection is gone.
            Ok(Err(_)) => Err(RecordStoreError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&seq);
                tracing::warn!(seq, "record store request timed out");
                Err(RecordStoreError::Timeout)
            }
        }
    }
}

impl RecordStore for RemoteRecordStore {
    async fn list(&self) -> Result<Vec<Task>, RecordStoreError> {
        match self.request(StoreOp::ListTasks).await? {
            StoreResult::Rows(rows) => Ok(rows),
            StoreResult::Failed(reason) => Err(RecordStoreError::Rejected(reason)),
            _ => Err(RecordStoreError::UnexpectedReply("list")),
        }
    }

    async fn insert(&self, draft: TaskDraft) -> Result<Task, RecordStoreError> {
        match self.request(StoreOp::InsertTask { draft }).await? {
            StoreResult::Inserted(task) => Ok(task),
            StoreResult::Failed(reason) => Err(RecordStoreError::Rejected(reason)),
            _ => Err(RecordStoreError::UnexpectedReply("insert")),
        }
    }

    async fn set_done(&self, id: &TaskId, done: bool) -> Result<(), RecordStoreError> {
        let op = StoreOp::SetDone {
            id: id.clone(),
            done,
        };
        match self.request(op).await? {
            StoreResult::Affected(_) => Ok(()),
            StoreResult::Failed(reason) => Err(RecordStoreError::Rejected(reason)),
            _ => Err(RecordStoreError::UnexpectedReply("set_done")),
        }
    }

    async fn set_label(
        &self,
        id: &TaskId,
        label: &str,
        updated_at: Timestamp,
    ) -> Result<(), RecordStoreError> {
        let op = StoreOp::SetLabel {
            id: id.clone(),
            label: label.to_string(),
            updated_at,
        };
        match self.request(op).await? {
            StoreResult::Affected(_) => Ok(()),
            StoreResult::Failed(reason) => Err(RecordStoreError::Rejected(reason)),
            _ => Err(RecordStoreError::UnexpectedReply("set_label")),
        }
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RecordStoreError> {
        let op = StoreOp::DeleteTask { id: id.clone() };
        match self.request(op).await? {
            StoreResult::Affected(_) => Ok(()),
            StoreResult::Failed(reason) => Err(RecordStoreError::Rejected(reason)),
            _ => Err(RecordStoreError::UnexpectedReply("delete")),
        }
    }
}

/// Background task that reads reply frames and resolves waiting requests.
///
/// Malformed frames are logged and skipped — the task does not
/// disconnect on bad data. When the stream ends, `connected` is cleared
/// and all pending requests are dropped, which their callers observe as
/// [`RecordStoreError::ConnectionClosed`].
async fn reader_loop(mut ws_reader: WsReader, pending: PendingReplies, connected: Arc<AtomicBool>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match codec::decode_reply(&data) {
                Ok(reply) => {
                    let waiter = pending.lock().remove(&reply.seq);
                    if let Some(tx) = waiter {
                        let _ = tx.send(reply.result);
                    } else {
                        tracing::debug!(seq = reply.seq, "reply with no waiting request");
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed record store frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("record store closed the connection");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "record store read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    pending.lock().clear();
    tracing::info!("record store reader task exiting");
}
