//! Canonical in-memory task collection and derived read views.
//!
//! [`TaskStore`] is the leaf component: it holds the ordered collection
//! for the process lifetime and computes filtered views and counts on
//! demand. It performs no I/O and no validation — mutation policy lives
//! in [`crate::sync::TaskSynchronizer`], which owns the store
//! exclusively.
//!
//! The collection is kept behind an `Arc` and every mutation swaps in a
//! freshly built vector, so a collaborator holding an old
//! [`snapshot`](TaskStore::snapshot) can detect change with
//! `Arc::ptr_eq` instead of comparing contents.

use std::sync::Arc;

use taskpad_proto::task::{Task, TaskId};

/// Pending/completed/total tallies derived from the collection.
///
/// `pending + completed == total` holds for every reachable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounts {
    /// Tasks with `done == false`.
    pub pending: usize,
    /// Tasks with `done == true`.
    pub completed: usize,
    /// All tasks.
    pub total: usize,
}

/// Ordered task collection with derived read views.
///
/// Collection order is insertion order with the newest-created task
/// first; hydration replaces the whole collection with the remote
/// store's `created_at`-descending order.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Arc<Vec<Task>>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the entire collection.
    ///
    /// Used by hydration and by rollback-to-snapshot. Input ids are
    /// assumed unique and labels already validated.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = Arc::new(tasks);
    }

    /// Prepends a single task.
    ///
    /// Calling this with an id already present is a caller invariant
    /// violation, not a runtime-checked error.
    pub fn insert_front(&mut self, task: Task) {
        debug_assert!(
            !self.tasks.iter().any(|t| t.id == task.id),
            "duplicate task id inserted"
        );
        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.push(task);
        next.extend(self.tasks.iter().cloned());
        self.tasks = Arc::new(next);
    }

    /// Appends a single task at the back.
    ///
    /// This is the delete-rollback path: a task removed optimistically
    /// is restored at the end of the collection, not necessarily at its
    /// original position.
    pub fn push_back(&mut self, task: Task) {
        debug_assert!(
            !self.tasks.iter().any(|t| t.id == task.id),
            "duplicate task id appended"
        );
        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.extend(self.tasks.iter().cloned());
        next.push(task);
        self.tasks = Arc::new(next);
    }

    /// Replaces the task with the matching id by `mutator(&old)`.
    ///
    /// Returns `true` if a task was replaced, `false` if the id is
    /// absent (no-op).
    pub fn replace_one(&mut self, id: &TaskId, mutator: impl FnOnce(&Task) -> Task) -> bool {
        let Some(index) = self.tasks.iter().position(|t| t.id == *id) else {
            return false;
        };
        let mut next: Vec<Task> = self.tasks.iter().cloned().collect();
        next[index] = mutator(&self.tasks[index]);
        self.tasks = Arc::new(next);
        true
    }

    /// Removes and returns the task with the matching id, or `None` if
    /// absent (no-op).
    pub fn remove_one(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == *id)?;
        let mut next: Vec<Task> = self.tasks.iter().cloned().collect();
        let removed = next.remove(index);
        self.tasks = Arc::new(next);
        Some(removed)
    }

    /// Returns the task with the matching id, if present.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    /// Tasks with `done == false`, in collection order.
    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.done)
    }

    /// Tasks with `done == true`, in collection order.
    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.done)
    }

    /// Derives pending/completed/total tallies from the collection.
    #[must_use]
    pub fn counts(&self) -> TaskCounts {
        let pending = self.pending().count();
        let completed = self.completed().count();
        TaskCounts {
            pending,
            completed,
            total: self.tasks.len(),
        }
    }

    /// Cheap handle to the current collection value.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Task>> {
        Arc::clone(&self.tasks)
    }

    /// Number of tasks in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
