//! Property-based tests for the task collection invariants.
//!
//! Drives [`TaskStore`] through arbitrary operation sequences and checks
//! after every step that:
//! 1. No two tasks ever share an id.
//! 2. `counts().pending + counts().completed == counts().total`.
//! 3. The pending and completed views partition the collection in order.

use proptest::prelude::*;
use std::collections::HashSet;

use taskpad::store::TaskStore;
use taskpad_proto::task::{Task, TaskDraft, TaskId, Timestamp};

/// One randomly chosen store operation.
///
/// Index-based operations pick a target from the current collection
/// (modulo its length), so sequences stay meaningful as the collection
/// shrinks and grows.
#[derive(Debug, Clone)]
enum Op {
    InsertFront(String),
    PushBack(String),
    Toggle(usize),
    Relabel(usize, String),
    Remove(usize),
    RemoveMissing,
    ReplaceAll(Vec<(String, bool)>),
}

/// Strategy for generating a label.
fn arb_label() -> impl Strategy<Value = String> {
    "[a-z ]{1,16}"
}

/// Strategy for generating one operation.
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_label().prop_map(Op::InsertFront),
        arb_label().prop_map(Op::PushBack),
        any::<usize>().prop_map(Op::Toggle),
        (any::<usize>(), arb_label()).prop_map(|(i, label)| Op::Relabel(i, label)),
        any::<usize>().prop_map(Op::Remove),
        Just(Op::RemoveMissing),
        prop::collection::vec((arb_label(), any::<bool>()), 0..8).prop_map(Op::ReplaceAll),
    ]
}

/// Builds a fresh task for insertion.
fn make_task(label: &str, done: bool) -> Task {
    let mut task = Task::from_draft(TaskDraft::new(label.to_string()), Timestamp::now());
    task.done = done;
    task
}

/// Picks the id at `index % len`, if the collection is non-empty.
fn nth_id(store: &TaskStore, index: usize) -> Option<TaskId> {
    let snapshot = store.snapshot();
    if snapshot.is_empty() {
        None
    } else {
        Some(snapshot[index % snapshot.len()].id.clone())
    }
}

/// Applies one operation.
fn apply(store: &mut TaskStore, op: Op) {
    match op {
        Op::InsertFront(label) => store.insert_front(make_task(&label, false)),
        Op::PushBack(label) => store.push_back(make_task(&label, false)),
        Op::Toggle(index) => {
            if let Some(id) = nth_id(store, index) {
                store.replace_one(&id, |t| Task {
                    done: !t.done,
                    updated_at: Timestamp::now(),
                    ..t.clone()
                });
            }
        }
        Op::Relabel(index, label) => {
            if let Some(id) = nth_id(store, index) {
                store.replace_one(&id, |t| Task {
                    label: label.clone(),
                    updated_at: Timestamp::now(),
                    ..t.clone()
                });
            }
        }
        Op::Remove(index) => {
            if let Some(id) = nth_id(store, index) {
                store.remove_one(&id);
            }
        }
        Op::RemoveMissing => {
            store.remove_one(&TaskId::new());
        }
        Op::ReplaceAll(rows) => {
            let tasks = rows
                .into_iter()
                .map(|(label, done)| make_task(&label, done))
                .collect();
            store.replace_all(tasks);
        }
    }
}

/// Checks the store invariants.
fn check_invariants(store: &TaskStore) -> Result<(), TestCaseError> {
    let snapshot = store.snapshot();

    // 1. Id uniqueness.
    let ids: HashSet<&TaskId> = snapshot.iter().map(|t| &t.id).collect();
    prop_assert_eq!(ids.len(), snapshot.len());

    // 2. Count consistency.
    let counts = store.counts();
    prop_assert_eq!(counts.pending + counts.completed, counts.total);
    prop_assert_eq!(counts.total, snapshot.len());

    // 3. The views partition the collection, preserving order.
    let pending: Vec<&TaskId> = store.pending().map(|t| &t.id).collect();
    let completed: Vec<&TaskId> = store.completed().map(|t| &t.id).collect();
    prop_assert_eq!(pending.len() + completed.len(), snapshot.len());

    let expected_pending: Vec<&TaskId> = snapshot
        .iter()
        .filter(|t| !t.done)
        .map(|t| &t.id)
        .collect();
    prop_assert_eq!(pending, expected_pending);

    let expected_completed: Vec<&TaskId> =
        snapshot.iter().filter(|t| t.done).map(|t| &t.id).collect();
    prop_assert_eq!(completed, expected_completed);

    Ok(())
}

proptest! {
    /// The invariants hold after every operation of any sequence.
    #[test]
    fn invariants_hold_under_arbitrary_op_sequences(
        ops in prop::collection::vec(arb_op(), 0..64)
    ) {
        let mut store = TaskStore::new();
        for op in ops {
            apply(&mut store, op);
            check_invariants(&store)?;
        }
    }

    /// Timestamps on stored rows never violate `created_at <= updated_at`.
    #[test]
    fn stored_rows_keep_timestamp_order(
        ops in prop::collection::vec(arb_op(), 0..64)
    ) {
        let mut store = TaskStore::new();
        for op in ops {
            apply(&mut store, op);
            for task in store.snapshot().iter() {
                prop_assert!(task.created_at <= task.updated_at);
            }
        }
    }
}
