//! The authoritative `tasks` table.
//!
//! [`TaskTable`] owns the stored rows and is the authority for id and
//! timestamp assignment on insert. Updates and deletes affect at most
//! one row; a missing id affects zero rows and is not an error, so the
//! affected count is reported back to the client instead.

use tokio::sync::Mutex;

use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp, normalize_label};

/// Errors that can occur during table operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The label is empty or all whitespace.
    #[error("label cannot be blank")]
    BlankLabel,
}

/// One stored row plus its insertion sequence.
///
/// The sequence breaks `created_at` ties (two inserts can land on the
/// same millisecond), keeping the listing order deterministic.
#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    task: Task,
}

/// Inner table state guarded by one lock.
#[derive(Debug, Default)]
struct TableInner {
    rows: Vec<StoredRow>,
    next_seq: u64,
}

/// In-memory `tasks` table.
#[derive(Debug, Default)]
pub struct TaskTable {
    inner: Mutex<TableInner>,
}

impl TaskTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new row, assigning id and timestamps, and returns it.
    ///
    /// The label is trimmed before storing.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::BlankLabel`] if the label is empty or all
    /// whitespace.
    pub async fn insert(&self, draft: TaskDraft) -> Result<Task, TableError> {
        let label = normalize_label(&draft.label).ok_or(TableError::BlankLabel)?;
        let task = Task::from_draft(TaskDraft { label, ..draft }, Timestamp::now());

        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.rows.push(StoredRow {
            seq,
            task: task.clone(),
        });
        Ok(task)
    }

    /// Returns all rows ordered by `created_at` descending.
    ///
    /// Rows created on the same millisecond are ordered by insertion,
    /// newest first.
    pub async fn list_desc(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        let mut ordered: Vec<&StoredRow> = inner.rows.iter().collect();
        ordered.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        ordered.into_iter().map(|r| r.task.clone()).collect()
    }

    /// Sets the completion flag of one row, refreshing its `updated_at`.
    ///
    /// Returns the number of rows affected (zero or one).
    pub async fn set_done(&self, id: &TaskId, done: bool) -> u64 {
        let mut inner = self.inner.lock().await;
        match inner.rows.iter_mut().find(|r| r.task.id == *id) {
            Some(row) => {
                row.task.done = done;
                row.task.updated_at = Timestamp::now();
                1
            }
            None => 0,
        }
    }

    /// Sets the label of one row, applying the caller's `updated_at`.
    ///
    /// The label is trimmed before storing, and `updated_at` never
    /// regresses below the row's `created_at`.
    ///
    /// Returns the number of rows affected (zero or one).
    ///
    /// # Errors
    ///
    /// Returns [`TableError::BlankLabel`] if the label is empty or all
    /// whitespace.
    pub async fn set_label(
        &self,
        id: &TaskId,
        label: &str,
        updated_at: Timestamp,
    ) -> Result<u64, TableError> {
        let label = normalize_label(label).ok_or(TableError::BlankLabel)?;
        let mut inner = self.inner.lock().await;
        match inner.rows.iter_mut().find(|r| r.task.id == *id) {
            Some(row) => {
                row.task.label = label;
                row.task.updated_at = updated_at.max(row.task.created_at);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Deletes one row.
    ///
    /// Returns the number of rows affected (zero or one).
    pub async fn delete(&self, id: &TaskId) -> u64 {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.task.id != *id);
        (before - inner.rows.len()) as u64
    }

    /// Number of rows currently stored.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    /// Whether the table has no rows.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.rows.is_empty()
    }
}
