//! Property-based tests for the record and wire protocol types.
//!
//! Uses proptest to verify:
//! 1. Any valid request/reply survives an encode → decode round-trip.
//! 2. Random bytes never cause a panic in decode (graceful `Err`).
//! 3. Label normalization is idempotent and never yields blank output.

use proptest::prelude::*;
use taskpad_proto::codec;
use taskpad_proto::store::{StoreOp, StoreReply, StoreRequest, StoreResult};
use taskpad_proto::task::{OwnerId, Task, TaskDraft, TaskId, Timestamp, normalize_label};
use uuid::Uuid;

// --- Arbitrary implementations for protocol types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    any::<u128>().prop_map(|n| TaskId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating arbitrary optional `OwnerId` values.
fn arb_owner() -> impl Strategy<Value = Option<OwnerId>> {
    prop::option::of(any::<u128>().prop_map(|n| OwnerId::from_uuid(Uuid::from_u128(n))))
}

/// Strategy for generating arbitrary `Timestamp` values.
fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    any::<u64>().prop_map(Timestamp::from_millis)
}

/// Strategy for generating non-empty labels.
fn arb_label() -> impl Strategy<Value = String> {
    "[^\x00]{1,256}"
}

/// Strategy for generating arbitrary `Task` rows.
///
/// `updated_at` is generated at or after `created_at`, matching the
/// stored-row invariant.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        arb_owner(),
        arb_label(),
        any::<bool>(),
        any::<u64>(),
        0u64..1_000_000,
    )
        .prop_map(|(id, owner, label, done, created, bump)| Task {
            id,
            owner,
            label,
            done,
            created_at: Timestamp::from_millis(created),
            updated_at: Timestamp::from_millis(created.saturating_add(bump)),
        })
}

/// Strategy for generating arbitrary `TaskDraft` values.
fn arb_draft() -> impl Strategy<Value = TaskDraft> {
    (arb_label(), any::<bool>(), arb_owner()).prop_map(|(label, done, owner)| TaskDraft {
        label,
        done,
        owner,
    })
}

/// Strategy for generating arbitrary `StoreOp` values.
fn arb_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        Just(StoreOp::ListTasks),
        arb_draft().prop_map(|draft| StoreOp::InsertTask { draft }),
        (arb_task_id(), any::<bool>()).prop_map(|(id, done)| StoreOp::SetDone { id, done }),
        (arb_task_id(), arb_label(), arb_timestamp()).prop_map(|(id, label, updated_at)| {
            StoreOp::SetLabel {
                id,
                label,
                updated_at,
            }
        }),
        arb_task_id().prop_map(|id| StoreOp::DeleteTask { id }),
    ]
}

/// Strategy for generating arbitrary `StoreResult` values.
fn arb_result() -> impl Strategy<Value = StoreResult> {
    prop_oneof![
        prop::collection::vec(arb_task(), 0..8).prop_map(StoreResult::Rows),
        arb_task().prop_map(StoreResult::Inserted),
        any::<u64>().prop_map(StoreResult::Affected),
        ".*".prop_map(StoreResult::Failed),
    ]
}

// --- Property tests ---

proptest! {
    /// Any valid request survives an encode → decode round-trip.
    #[test]
    fn request_round_trip(seq in any::<u64>(), op in arb_op()) {
        let request = StoreRequest { seq, op };
        let bytes = codec::encode_request(&request).expect("encode should succeed");
        let decoded = codec::decode_request(&bytes).expect("decode should succeed");
        prop_assert_eq!(request, decoded);
    }

    /// Any valid reply survives an encode → decode round-trip.
    #[test]
    fn reply_round_trip(seq in any::<u64>(), result in arb_result()) {
        let reply = StoreReply { seq, result };
        let bytes = codec::encode_reply(&reply).expect("encode should succeed");
        let decoded = codec::decode_reply(&bytes).expect("decode should succeed");
        prop_assert_eq!(reply, decoded);
    }

    /// Random bytes never panic the decoders.
    #[test]
    fn random_bytes_never_panic_decode(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_request(&bytes);
        let _ = codec::decode_reply(&bytes);
    }

    /// Normalization output is never blank and carries no surrounding
    /// whitespace.
    #[test]
    fn normalized_labels_are_never_blank(raw in ".*") {
        if let Some(label) = normalize_label(&raw) {
            prop_assert!(!label.is_empty());
            prop_assert_eq!(label.trim(), label.as_str());
        } else {
            prop_assert!(raw.trim().is_empty());
        }
    }

    /// Normalization is idempotent.
    #[test]
    fn normalization_is_idempotent(raw in ".*") {
        if let Some(once) = normalize_label(&raw) {
            prop_assert_eq!(normalize_label(&once), Some(once.clone()));
        }
    }
}
