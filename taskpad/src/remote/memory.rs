//! In-process implementation of [`RecordStore`].
//!
//! Backs the offline demo mode and the test suite. Behaves like the
//! real service: assigns ids and timestamps on insert, returns rows
//! `created_at`-descending, and treats missing ids as zero-row updates.
//! Failure injection makes the rollback paths testable: `set_failing`
//! fails every call until cleared, `fail_next` fails exactly one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp, normalize_label};

use super::{RecordStore, RecordStoreError};

/// One stored row plus its insertion sequence.
///
/// The sequence breaks `created_at` ties (two inserts can land on the
/// same millisecond), keeping list order deterministic.
#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    task: Task,
}

/// In-memory record store with failure injection.
pub struct MemoryRecordStore {
    rows: Mutex<Vec<StoredRow>>,
    next_seq: AtomicU64,
    fail_all: AtomicBool,
    fail_next: AtomicBool,
    calls: AtomicU64,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            fail_all: AtomicBool::new(false),
            fail_next: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Makes every subsequent call fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Makes exactly the next call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of store calls made so far (including failed ones).
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Records a call and reports whether it should fail.
    fn register_call(&self) -> Result<(), RecordStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) || self.fail_all.load(Ordering::SeqCst) {
            return Err(RecordStoreError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn list(&self) -> Result<Vec<Task>, RecordStoreError> {
        self.register_call()?;
        let rows = self.rows.lock();
        let mut ordered: Vec<&StoredRow> = rows.iter().collect();
        ordered.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(ordered.into_iter().map(|r| r.task.clone()).collect())
    }

    async fn insert(&self, draft: TaskDraft) -> Result<Task, RecordStoreError> {
        self.register_call()?;
        if normalize_label(&draft.label).is_none() {
            return Err(RecordStoreError::Rejected(
                "label cannot be blank".to_string(),
            ));
        }
        let task = Task::from_draft(draft, Timestamp::now());
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().push(StoredRow {
            seq,
            task: task.clone(),
        });
        Ok(task)
    }

    async fn set_done(&self, id: &TaskId, done: bool) -> Result<(), RecordStoreError> {
        self.register_call()?;
        let mut rows = self.rows.lock();
        if let Some(row) = rows.iter_mut().find(|r| r.task.id == *id) {
            row.task.done = done;
            row.task.updated_at = Timestamp::now();
        }
        Ok(())
    }

    async fn set_label(
        &self,
        id: &TaskId,
        label: &str,
        updated_at: Timestamp,
    ) -> Result<(), RecordStoreError> {
        self.register_call()?;
        let Some(label) = normalize_label(label) else {
            return Err(RecordStoreError::Rejected(
                "label cannot be blank".to_string(),
            ));
        };
        let mut rows = self.rows.lock();
        if let Some(row) = rows.iter_mut().find(|r| r.task.id == *id) {
            row.task.label = label;
            // updated_at never regresses below created_at.
            row.task.updated_at = updated_at.max(row.task.created_at);
        }
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RecordStoreError> {
        self.register_call()?;
        self.rows.lock().retain(|r| r.task.id != *id);
        Ok(())
    }
}
