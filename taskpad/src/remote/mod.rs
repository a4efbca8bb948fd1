//! Record store client abstraction.
//!
//! Defines the [`RecordStore`] trait that the synchronizer receives at
//! construction. Concrete implementations:
//! - [`memory::MemoryRecordStore`] — in-process table for tests and
//!   offline mode
//! - [`ws::RemoteRecordStore`] — WebSocket client for a `taskpad-server`
//!   instance

pub mod memory;
pub mod ws;

use taskpad_proto::codec::CodecError;
use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp};

/// Errors that can occur during record store operations.
///
/// The synchronizer treats every variant uniformly: roll back the
/// optimistic change (where one was made) and surface a transient
/// notice. The variants exist for logging and for transport-level
/// callers.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    /// The connection to the record store has been closed.
    #[error("record store connection closed")]
    ConnectionClosed,

    /// The operation timed out before a reply arrived.
    #[error("record store operation timed out")]
    Timeout,

    /// Encoding or decoding a wire frame failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The store processed the request and rejected it.
    #[error("record store rejected the operation: {0}")]
    Rejected(String),

    /// The store answered with a reply shape that does not match the
    /// request.
    #[error("unexpected record store reply to {0}")]
    UnexpectedReply(&'static str),

    /// An underlying I/O error occurred.
    #[error("record store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async client capability for the remote `tasks` table.
///
/// The synchronizer is generic over this trait, so tests substitute an
/// in-memory fake with failure injection for the network-backed store.
///
/// # Contract
///
/// `list` returns rows ordered by `created_at` descending. `insert`
/// assigns `id`, `created_at`, and `updated_at` store-side and returns
/// the full row. Updates and deletes affect at most one row; a missing
/// id affects zero rows and is not an error.
pub trait RecordStore: Send + Sync {
    /// Fetch all rows, ordered by `created_at` descending.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Task>, RecordStoreError>> + Send;

    /// Insert a new row and return it with store-assigned identity and
    /// timestamps.
    fn insert(
        &self,
        draft: TaskDraft,
    ) -> impl std::future::Future<Output = Result<Task, RecordStoreError>> + Send;

    /// Set the completion flag of one row. The store refreshes the
    /// row's `updated_at` itself.
    fn set_done(
        &self,
        id: &TaskId,
        done: bool,
    ) -> impl std::future::Future<Output = Result<(), RecordStoreError>> + Send;

    /// Set the label of one row, carrying the caller's `updated_at`.
    fn set_label(
        &self,
        id: &TaskId,
        label: &str,
        updated_at: Timestamp,
    ) -> impl std::future::Future<Output = Result<(), RecordStoreError>> + Send;

    /// Delete one row.
    fn delete(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), RecordStoreError>> + Send;
}
