//! End-to-end tests: synchronizer over a live record store service.
//!
//! Starts the WebSocket server in-process on an OS-assigned port,
//! connects the real client, and drives the full create/toggle/edit/
//! delete/hydrate surface across the wire.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use taskpad::remote::ws::RemoteRecordStore;
use taskpad::sync::{SyncConfig, TaskEvent, TaskSynchronizer};
use taskpad_server::server::{ServerState, start_server, start_server_with_state};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Starts an in-process service and returns its URL plus the handle.
async fn test_server_url() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server");
    (format!("ws://{addr}/ws"), handle)
}

/// Starts an in-process service and returns its URL plus the shared state.
async fn test_server_with_state() -> (String, Arc<ServerState>) {
    let state = Arc::new(ServerState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start test server");
    (format!("ws://{addr}/ws"), state)
}

/// Connects a synchronizer to the given service.
async fn connect_sync(
    url: &str,
) -> (
    Arc<TaskSynchronizer<RemoteRecordStore>>,
    mpsc::Receiver<TaskEvent>,
) {
    let store = RemoteRecordStore::connect_with(
        url,
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .await
    .expect("failed to connect record store client");
    TaskSynchronizer::new(
        store,
        SyncConfig {
            error_clear: Duration::from_millis(200),
            marker_clear: Duration::from_millis(100),
            event_buffer: 256,
        },
    )
}

// ---------------------------------------------------------------------------
// End-to-end flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hydrate_of_an_empty_table_yields_an_empty_collection() {
    let (url, _handle) = test_server_url().await;
    let (sync, _events) = connect_sync(&url).await;

    sync.hydrate().await;

    assert!(sync.tasks().is_empty());
    assert!(!sync.loading());
    assert!(sync.current_error().is_none());
}

#[tokio::test]
async fn create_round_trips_the_stored_row() {
    let (url, _handle) = test_server_url().await;
    let (sync, _events) = connect_sync(&url).await;

    sync.create("  shipped over the wire  ").await;

    let tasks = sync.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].label, "shipped over the wire");
    assert!(!tasks[0].done);
    assert!(tasks[0].created_at <= tasks[0].updated_at);
    assert_eq!(sync.newly_added_id(), Some(tasks[0].id.clone()));
}

#[tokio::test]
async fn full_mutation_surface_against_live_server() {
    let (url, _handle) = test_server_url().await;
    let (sync, _events) = connect_sync(&url).await;

    sync.create("first").await;
    sync.create("second").await;
    let second = sync.tasks()[0].id.clone();
    let first = sync.tasks()[1].id.clone();

    sync.toggle(&first).await;
    sync.edit(&second, "second, renamed").await;

    let counts = sync.counts();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.completed, 1);

    sync.delete(&first).await;
    assert_eq!(sync.counts().total, 1);
    assert_eq!(sync.tasks()[0].label, "second, renamed");
    assert!(sync.current_error().is_none());
}

#[tokio::test]
async fn a_second_client_hydrates_the_same_rows() {
    let (url, _handle) = test_server_url().await;
    let (writer, _writer_events) = connect_sync(&url).await;

    writer.create("shared task").await;
    let written = writer.tasks()[0].clone();

    let (reader, _reader_events) = connect_sync(&url).await;
    reader.hydrate().await;

    let seen = reader.tasks();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, written.id);
    assert_eq!(seen[0].label, "shared task");
}

#[tokio::test]
async fn rehydrate_reflects_remote_mutations() {
    let (url, _handle) = test_server_url().await;
    let (a, _a_events) = connect_sync(&url).await;
    let (b, _b_events) = connect_sync(&url).await;

    a.create("toggle target").await;
    let id = a.tasks()[0].id.clone();
    a.toggle(&id).await;

    b.hydrate().await;
    assert_eq!(b.tasks().len(), 1);
    assert!(b.tasks()[0].done);
}

// ---------------------------------------------------------------------------
// Failure surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_after_connection_loss_raises_a_notice() {
    let (url, state) = test_server_with_state().await;
    let (sync, _events) = connect_sync(&url).await;
    sync.create("survivor").await;

    state.close_all_connections().await;

    // Wait for the client reader to notice the lost connection, then
    // keep trying until a create fails cleanly.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        sync.create("doomed").await;
        if sync.current_error().is_some() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "connection loss never surfaced as an error notice"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // The failed creates inserted nothing beyond what succeeded.
    let labels: Vec<String> = sync
        .tasks()
        .iter()
        .filter(|t| t.label == "survivor")
        .map(|t| t.label.clone())
        .collect();
    assert_eq!(labels.len(), 1);
}

#[tokio::test]
async fn toggle_after_connection_loss_rolls_back() {
    let (url, state) = test_server_with_state().await;
    let (sync, _events) = connect_sync(&url).await;
    sync.create("flip me").await;
    let id = sync.tasks()[0].id.clone();

    state.close_all_connections().await;

    // Probe with creates until the dead connection is observed.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        sync.create("probe").await;
        if sync.current_error().is_some() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "connection loss never surfaced as an error notice"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // With the connection known dead, a toggle must fail and leave the
    // record exactly as it was.
    let before = sync
        .tasks()
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .expect("target task should still be present");
    sync.toggle(&id).await;
    let after = sync
        .tasks()
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .expect("target task should still be present");
    assert_eq!(after, before);
}
