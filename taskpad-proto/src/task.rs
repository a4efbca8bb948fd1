//! Task record types shared by the client core and the record store.
//!
//! A [`Task`] is the stored row shape: identity and timestamps are
//! assigned by the record store on insert, so clients submit a
//! [`TaskDraft`] and receive the full row back. Label normalization
//! lives here so both sides agree on what counts as a blank label.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task record (random UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user that owns a task.
///
/// Present only when an ownership model is active; the single-user
/// core always stores `None` and never mutates the field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates an `OwnerId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A single task row.
///
/// Rows are replaced wholesale on mutation, never edited in place, so
/// `id` and `created_at` stay immutable for the row's lifetime and
/// `created_at <= updated_at` holds at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned unique identifier, immutable once assigned.
    pub id: TaskId,
    /// Owning user, if an ownership model is active.
    pub owner: Option<OwnerId>,
    /// Non-empty, whitespace-trimmed description.
    pub label: String,
    /// Completion flag.
    pub done: bool,
    /// When the row was created. Never refreshed.
    pub created_at: Timestamp,
    /// When `label` or `done` last changed; equals `created_at` on insert.
    pub updated_at: Timestamp,
}

impl Task {
    /// Builds the stored row for a draft, assigning a fresh identity
    /// and setting both timestamps to `now`.
    #[must_use]
    pub fn from_draft(draft: TaskDraft, now: Timestamp) -> Self {
        Self {
            id: TaskId::new(),
            owner: draft.owner,
            label: draft.label,
            done: draft.done,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Insert payload for a new task.
///
/// Carries only the caller-supplied fields; the record store is the
/// authority for `id`, `created_at`, and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Trimmed, non-empty description.
    pub label: String,
    /// Completion flag; `false` for freshly created tasks.
    pub done: bool,
    /// Owning user, if any.
    pub owner: Option<OwnerId>,
}

impl TaskDraft {
    /// Builds the standard creation draft: the given label, not done,
    /// no owner.
    #[must_use]
    pub const fn new(label: String) -> Self {
        Self {
            label,
            done: false,
            owner: None,
        }
    }
}

/// Trims a raw label and rejects blank input.
///
/// Returns the trimmed label, or `None` if nothing but whitespace
/// remains. Callers must not store a label this function rejects.
#[must_use]
pub fn normalize_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
