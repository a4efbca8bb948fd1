//! Record store wire protocol.
//!
//! Requests and replies exchanged between a Taskpad client and the
//! record store service. Each request carries a client-chosen sequence
//! number that the service echoes back, so a client can keep several
//! operations in flight on one connection and correlate the replies.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskDraft, TaskId, Timestamp};

/// A single record store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOp {
    /// Fetch all rows, ordered by `created_at` descending.
    ListTasks,
    /// Insert a new row; the store assigns id and timestamps and
    /// returns the full row.
    InsertTask {
        /// Caller-supplied fields of the new row.
        draft: TaskDraft,
    },
    /// Set the completion flag of one row. The store refreshes the
    /// row's `updated_at` itself.
    SetDone {
        /// Row to update.
        id: TaskId,
        /// New completion flag.
        done: bool,
    },
    /// Set the label of one row, carrying the caller's `updated_at`.
    SetLabel {
        /// Row to update.
        id: TaskId,
        /// New trimmed, non-empty label.
        label: String,
        /// Caller-observed modification time.
        updated_at: Timestamp,
    },
    /// Delete one row.
    DeleteTask {
        /// Row to delete.
        id: TaskId,
    },
}

/// Outcome of a record store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreResult {
    /// Reply to [`StoreOp::ListTasks`].
    Rows(Vec<Task>),
    /// Reply to [`StoreOp::InsertTask`]: the stored row.
    Inserted(Task),
    /// Reply to updates and deletes: how many rows were affected
    /// (zero or one).
    Affected(u64),
    /// The operation was rejected or failed store-side.
    Failed(String),
}

/// A client request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    /// Client-chosen correlation number, echoed in the reply.
    pub seq: u64,
    /// The operation to perform.
    pub op: StoreOp,
}

/// A service reply frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReply {
    /// Correlation number of the request this answers.
    pub seq: u64,
    /// The operation outcome.
    pub result: StoreResult,
}
