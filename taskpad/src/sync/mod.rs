//! Task synchronization layer.
//!
//! [`TaskSynchronizer`] wraps the [`TaskStore`] with mutation operations
//! that apply an optimistic local change, mirror it to the record store,
//! and roll the local change back if the remote call fails. It also owns
//! initial hydration, the transient error notice, and the short-lived
//! "newly added" marker used for presentation hinting.
//!
//! The synchronizer is the only component that mutates the store. State
//! is guarded by a `parking_lot` mutex that is never held across an
//! await: the optimistic mutation happens synchronously before the
//! remote call suspends, and the rollback happens synchronously after
//! it resumes. Collaborators observe changes through [`TaskEvent`]s and
//! read the derived views through the synchronous accessors.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp, normalize_label};

use crate::remote::RecordStore;
use crate::store::{TaskCounts, TaskStore};

/// Timer delays and channel sizing for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long an error notice stays up before auto-clearing.
    pub error_clear: Duration,
    /// How long the newly-added marker stays up.
    pub marker_clear: Duration,
    /// Buffer size for the [`TaskEvent`] channel.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            error_clear: Duration::from_millis(5000),
            marker_clear: Duration::from_millis(2000),
            event_buffer: 64,
        }
    }
}

/// A transient, human-readable failure notice.
///
/// At most one notice is active at a time; a newer notice replaces the
/// old one and restarts the auto-clear timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    /// What went wrong, in words fit for display.
    pub message: String,
    /// When the notice was raised.
    pub raised_at: Timestamp,
}

/// Events emitted by the [`TaskSynchronizer`] for collaborator notification.
///
/// Delivery is best-effort: events are dropped if the channel is full,
/// so collaborators must treat them as change hints and re-read the
/// accessors, not as a replayable log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The collection changed; derived views should be recomputed.
    TasksChanged,
    /// Hydration started or finished.
    LoadingChanged(bool),
    /// A remote operation failed and a notice is now active.
    ErrorRaised(ErrorNotice),
    /// The active notice was cleared.
    ErrorCleared,
    /// A freshly created task landed in the collection.
    NewlyAdded(TaskId),
    /// The newly-added marker expired.
    NewlyAddedCleared,
}

/// Which mirrored field a remote update call carries.
enum RemoteField {
    Done,
    Label,
}

/// State owned by the synchronizer, never locked across an await.
struct SyncState {
    store: TaskStore,
    loading: bool,
    error: Option<ErrorNotice>,
    error_gen: u64,
    error_timer: Option<JoinHandle<()>>,
    newly_added: Option<TaskId>,
    marker_gen: u64,
    marker_timer: Option<JoinHandle<()>>,
}

/// Mediates all task mutations against an injected [`RecordStore`].
///
/// Constructed via [`new`](Self::new), which returns the synchronizer
/// and a receiver for [`TaskEvent`]s that the collaborator should
/// consume. Mutation operations take `self: &Arc<Self>` because
/// failure notices and markers arm background clear timers that hold a
/// handle to the synchronizer.
pub struct TaskSynchronizer<R: RecordStore> {
    remote: R,
    config: SyncConfig,
    state: Mutex<SyncState>,
    event_tx: mpsc::Sender<TaskEvent>,
}

impl<R: RecordStore + 'static> TaskSynchronizer<R> {
    /// Creates a synchronizer over the given record store.
    ///
    /// The collection starts empty; call [`hydrate`](Self::hydrate) to
    /// load the remote rows.
    #[must_use]
    pub fn new(remote: R, config: SyncConfig) -> (Arc<Self>, mpsc::Receiver<TaskEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let synchronizer = Arc::new(Self {
            remote,
            config,
            state: Mutex::new(SyncState {
                store: TaskStore::new(),
                loading: false,
                error: None,
                error_gen: 0,
                error_timer: None,
                newly_added: None,
                marker_gen: 0,
                marker_timer: None,
            }),
            event_tx,
        });
        (synchronizer, event_rx)
    }

    /// Bulk-load the collection from the record store.
    ///
    /// Replaces the whole collection with the remote rows (already
    /// ordered `created_at` descending). On failure the collection is
    /// cleared and an error notice raised. Safe to invoke again — it
    /// simply re-fetches and replaces.
    pub async fn hydrate(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.loading = true;
        }
        self.emit(TaskEvent::LoadingChanged(true));

        let fetched = self.remote.list().await;
        {
            let mut state = self.state.lock();
            match &fetched {
                Ok(rows) => state.store.replace_all(rows.clone()),
                Err(_) => state.store.replace_all(Vec::new()),
            }
            state.loading = false;
        }
        self.emit(TaskEvent::TasksChanged);
        self.emit(TaskEvent::LoadingChanged(false));

        if let Err(err) = fetched {
            tracing::warn!(error = %err, "hydration failed, collection cleared");
            self.raise_error(format!("could not load tasks: {err}"));
        } else {
            tracing::debug!(count = self.counts().total, "hydrated task collection");
        }
    }

    /// Create a task with the given label.
    ///
    /// Blank labels are rejected silently — no remote call, no error
    /// notice. The insert goes to the record store first (ids are
    /// store-assigned, so there is nothing to insert optimistically);
    /// on success the returned row is prepended and the newly-added
    /// marker set. On failure only an error notice is raised — the
    /// collection is untouched.
    pub async fn create(self: &Arc<Self>, label: &str) {
        let Some(label) = normalize_label(label) else {
            tracing::debug!("ignoring create with blank label");
            return;
        };

        match self.remote.insert(TaskDraft::new(label)).await {
            Ok(task) => {
                let id = task.id.clone();
                {
                    let mut state = self.state.lock();
                    state.store.insert_front(task);
                }
                self.emit(TaskEvent::TasksChanged);
                self.mark_newly_added(id);
            }
            Err(err) => {
                tracing::warn!(error = %err, "remote insert failed");
                self.raise_error(format!("could not save the new task: {err}"));
            }
        }
    }

    /// Flip a task's completion flag.
    ///
    /// No-op if the id is absent. The flip and the `updated_at` refresh
    /// are applied optimistically before the remote update; on failure
    /// the exact pre-toggle record is restored.
    pub async fn toggle(self: &Arc<Self>, id: &TaskId) {
        let now = Timestamp::now();
        self.update_record(
            id,
            |task| Task {
                done: !task.done,
                updated_at: now,
                ..task.clone()
            },
            RemoteField::Done,
            "could not update the task",
        )
        .await;
    }

    /// Replace a task's label.
    ///
    /// Blank labels are rejected silently; absent ids are a no-op. The
    /// trimmed label and `updated_at` refresh are applied optimistically
    /// before the remote update; on failure the exact pre-edit record is
    /// restored.
    pub async fn edit(self: &Arc<Self>, id: &TaskId, label: &str) {
        let Some(label) = normalize_label(label) else {
            tracing::debug!("ignoring edit with blank label");
            return;
        };

        let now = Timestamp::now();
        self.update_record(
            id,
            move |task| Task {
                label,
                updated_at: now,
                ..task.clone()
            },
            RemoteField::Label,
            "could not rename the task",
        )
        .await;
    }

    /// Remove a task.
    ///
    /// No-op if the id is absent. The removal is applied optimistically;
    /// if the remote delete fails, the removed task is appended back
    /// (original position not guaranteed) and an error notice raised.
    pub async fn delete(self: &Arc<Self>, id: &TaskId) {
        let removed = {
            let mut state = self.state.lock();
            state.store.remove_one(id)
        };
        let Some(removed) = removed else {
            return;
        };
        self.emit(TaskEvent::TasksChanged);

        if let Err(err) = self.remote.delete(id).await {
            tracing::warn!(task_id = %id, error = %err, "remote delete failed, restoring task");
            {
                let mut state = self.state.lock();
                state.store.push_back(removed);
            }
            self.emit(TaskEvent::TasksChanged);
            self.raise_error(format!("could not delete the task: {err}"));
        }
    }

    /// Shared optimistic-update path for toggle and edit.
    ///
    /// Snapshots the record, applies the local mutation, issues the
    /// matching remote update, and restores the snapshot (raising an
    /// error notice) if the remote call fails.
    async fn update_record(
        self: &Arc<Self>,
        id: &TaskId,
        mutate: impl FnOnce(&Task) -> Task,
        field: RemoteField,
        failure_context: &str,
    ) {
        let applied = {
            let mut state = self.state.lock();
            match state.store.get(id).cloned() {
                Some(current) => {
                    let updated = mutate(&current);
                    state.store.replace_one(id, |_| updated.clone());
                    Some((current, updated))
                }
                None => None,
            }
        };
        let Some((snapshot, updated)) = applied else {
            return;
        };
        self.emit(TaskEvent::TasksChanged);

        let result = match field {
            RemoteField::Done => self.remote.set_done(id, updated.done).await,
            RemoteField::Label => {
                self.remote
                    .set_label(id, &updated.label, updated.updated_at)
                    .await
            }
        };

        if let Err(err) = result {
            tracing::warn!(task_id = %id, error = %err, "remote update failed, rolling back");
            {
                let mut state = self.state.lock();
                state.store.replace_one(id, |_| snapshot.clone());
            }
            self.emit(TaskEvent::TasksChanged);
            self.raise_error(format!("{failure_context}: {err}"));
        }
    }

    /// Current collection value (newest-created first).
    #[must_use]
    pub fn tasks(&self) -> Arc<Vec<Task>> {
        self.state.lock().store.snapshot()
    }

    /// Tasks with `done == false`, in collection order.
    #[must_use]
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.state.lock().store.pending().cloned().collect()
    }

    /// Tasks with `done == true`, in collection order.
    #[must_use]
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.state.lock().store.completed().cloned().collect()
    }

    /// Pending/completed/total tallies.
    #[must_use]
    pub fn counts(&self) -> TaskCounts {
        self.state.lock().store.counts()
    }

    /// Whether a hydration round trip is in flight.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.lock().loading
    }

    /// The active error notice, if any.
    #[must_use]
    pub fn current_error(&self) -> Option<ErrorNotice> {
        self.state.lock().error.clone()
    }

    /// Id of the most recently created task, while its marker lasts.
    #[must_use]
    pub fn newly_added_id(&self) -> Option<TaskId> {
        self.state.lock().newly_added.clone()
    }

    /// Access the underlying record store client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Cancels the clear timers so no state is mutated after teardown.
    ///
    /// Also called on drop; safe to call more than once.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.error_timer.take() {
            timer.abort();
        }
        if let Some(timer) = state.marker_timer.take() {
            timer.abort();
        }
    }

    /// Raises a notice, replacing any active one and restarting the
    /// auto-clear timer.
    fn raise_error(self: &Arc<Self>, message: String) {
        let notice = ErrorNotice {
            message,
            raised_at: Timestamp::now(),
        };
        let generation = {
            let mut state = self.state.lock();
            if let Some(old) = state.error_timer.take() {
                old.abort();
            }
            state.error_gen += 1;
            state.error = Some(notice.clone());

            let generation = state.error_gen;
            let this = Arc::clone(self);
            let delay = self.config.error_clear;
            state.error_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.clear_error_if(generation);
            }));
            generation
        };
        tracing::debug!(generation, "error notice raised");
        self.emit(TaskEvent::ErrorRaised(notice));
    }

    /// Clears the notice if it is still the one the timer was armed for.
    fn clear_error_if(&self, generation: u64) {
        let cleared = {
            let mut state = self.state.lock();
            if state.error_gen == generation && state.error.is_some() {
                state.error = None;
                state.error_timer = None;
                true
            } else {
                false
            }
        };
        if cleared {
            self.emit(TaskEvent::ErrorCleared);
        }
    }

    /// Sets the newly-added marker and arms its clear timer.
    ///
    /// Presentation hint only — skipping the clear has no correctness
    /// impact on the collection.
    fn mark_newly_added(self: &Arc<Self>, id: TaskId) {
        {
            let mut state = self.state.lock();
            if let Some(old) = state.marker_timer.take() {
                old.abort();
            }
            state.marker_gen += 1;
            state.newly_added = Some(id.clone());

            let generation = state.marker_gen;
            let this = Arc::clone(self);
            let delay = self.config.marker_clear;
            state.marker_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.clear_marker_if(generation);
            }));
        }
        self.emit(TaskEvent::NewlyAdded(id));
    }

    /// Clears the marker if it is still the one the timer was armed for.
    fn clear_marker_if(&self, generation: u64) {
        let cleared = {
            let mut state = self.state.lock();
            if state.marker_gen == generation && state.newly_added.is_some() {
                state.newly_added = None;
                state.marker_timer = None;
                true
            } else {
                false
            }
        };
        if cleared {
            self.emit(TaskEvent::NewlyAddedCleared);
        }
    }

    /// Best-effort event emission — a full channel drops the event.
    fn emit(&self, event: TaskEvent) {
        let _ = self.event_tx.try_send(event);
    }
}

impl<R: RecordStore> Drop for TaskSynchronizer<R> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.error_timer.take() {
            timer.abort();
        }
        if let Some(timer) = state.marker_timer.take() {
            timer.abort();
        }
    }
}
