//! Taskpad — single-user task list with optimistic remote sync.
//!
//! Thin line-oriented driver over the synchronizer's collaborator
//! surface. Connects to a record store service when one is configured,
//! otherwise runs offline against a seeded in-memory store.
//!
//! ```bash
//! # Offline demo mode
//! cargo run --bin taskpad
//!
//! # Against a record store service
//! cargo run --bin taskpad -- --server-url ws://127.0.0.1:9100/ws
//!
//! # Or via environment variable
//! TASKPAD_SERVER_URL=ws://127.0.0.1:9100/ws cargo run --bin taskpad
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use taskpad::config::{CliArgs, ClientConfig};
use taskpad::remote::RecordStore;
use taskpad::remote::memory::MemoryRecordStore;
use taskpad::remote::ws::RemoteRecordStore;
use taskpad::sync::{TaskEvent, TaskSynchronizer};
use taskpad_proto::task::{Task, TaskDraft, TaskId};

/// Labels used to seed the offline demo store.
const DEMO_TASKS: &[(&str, bool)] = &[
    ("Skim the getting-started guide", true),
    ("Write up meeting notes", true),
    ("Reply to the review thread", false),
    ("Book the dentist appointment", false),
    ("Water the plants", false),
];

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("taskpad starting");

    let result = match &config.server_url {
        Some(url) => {
            let store = RemoteRecordStore::connect_with(
                url,
                config.connect_timeout,
                config.request_timeout,
            )
            .await
            .map_err(|e| io::Error::other(format!("could not reach {url}: {e}")))?;
            println!("Connected to {url}.");
            run(store, &config).await
        }
        None => {
            println!("No server configured — running offline with demo tasks.");
            let store = MemoryRecordStore::new();
            seed_demo_tasks(&store).await;
            run(store, &config).await
        }
    };

    tracing::info!("taskpad exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs go to a file rather than stdout, which belongs to the
/// interactive loop. Returns a [`WorkerGuard`] that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskpad.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Populate the offline store with a handful of sample tasks.
async fn seed_demo_tasks(store: &MemoryRecordStore) {
    for (label, done) in DEMO_TASKS {
        match store.insert(TaskDraft::new((*label).to_string())).await {
            Ok(task) if *done => {
                let _ = store.set_done(&task.id, true).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(label, error = %e, "failed to seed demo task"),
        }
    }
}

/// Interactive loop over the synchronizer's operation surface.
async fn run<R: RecordStore + 'static>(store: R, config: &ClientConfig) -> io::Result<()> {
    let (sync, mut events) = TaskSynchronizer::new(store, config.to_sync_config());
    sync.hydrate().await;

    let mut visible = render(&sync, &config.timestamp_format);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&sync, &visible, line.trim()).await {
                    break;
                }
                visible = render(&sync, &config.timestamp_format);
            }
            event = events.recv() => {
                match event {
                    Some(TaskEvent::ErrorRaised(notice)) => {
                        println!("\n! {}", notice.message);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    sync.shutdown();
    Ok(())
}

/// Executes one command line; returns `false` to quit.
async fn handle_command<R: RecordStore + 'static>(
    sync: &Arc<TaskSynchronizer<R>>,
    visible: &[TaskId],
    line: &str,
) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match command {
        "add" => sync.create(rest).await,
        "done" | "toggle" => {
            if let Some(id) = nth(visible, rest) {
                sync.toggle(&id).await;
            } else {
                println!("no task #{rest}");
            }
        }
        "edit" => {
            let (index, label) = match rest.split_once(' ') {
                Some((index, label)) => (index, label),
                None => (rest, ""),
            };
            if let Some(id) = nth(visible, index) {
                sync.edit(&id, label).await;
            } else {
                println!("no task #{index}");
            }
        }
        "rm" | "delete" => {
            if let Some(id) = nth(visible, rest) {
                sync.delete(&id).await;
            } else {
                println!("no task #{rest}");
            }
        }
        "list" | "" => {}
        "quit" | "exit" => return false,
        other => println!("unknown command: {other}"),
    }
    true
}

/// Resolves a 1-based display index against the last rendered order.
fn nth(visible: &[TaskId], arg: &str) -> Option<TaskId> {
    let index: usize = arg.parse().ok()?;
    visible.get(index.checked_sub(1)?).cloned()
}

/// Prints both sections with counts and returns the display order.
fn render<R: RecordStore + 'static>(
    sync: &Arc<TaskSynchronizer<R>>,
    timestamp_format: &str,
) -> Vec<TaskId> {
    let pending = sync.pending_tasks();
    let completed = sync.completed_tasks();
    let counts = sync.counts();
    let newly_added = sync.newly_added_id();

    println!("\nTo do ({}):", counts.pending);
    let mut index = 0;
    for task in &pending {
        index += 1;
        print_task(index, task, newly_added.as_ref(), timestamp_format);
    }
    println!("Completed ({}):", counts.completed);
    for task in &completed {
        index += 1;
        print_task(index, task, newly_added.as_ref(), timestamp_format);
    }
    println!("{} task(s) total", counts.total);

    if let Some(notice) = sync.current_error() {
        println!("! {}", notice.message);
    }

    pending
        .iter()
        .chain(completed.iter())
        .map(|t| t.id.clone())
        .collect()
}

/// Prints one task line.
fn print_task(index: usize, task: &Task, newly_added: Option<&TaskId>, timestamp_format: &str) {
    let mark = if task.done { 'x' } else { ' ' };
    let highlight = if newly_added == Some(&task.id) { '*' } else { ' ' };
    let created = format_timestamp(task.created_at.as_millis(), timestamp_format);
    println!("{highlight}{index:>3}. [{mark}] {} ({created})", task.label);
}

/// Formats a millisecond UNIX timestamp for display.
fn format_timestamp(millis: u64, format: &str) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(String::new, |dt| dt.format(format).to_string())
}

/// Prints the command summary.
fn print_help() {
    println!("commands: add <label> | done <n> | edit <n> <label> | rm <n> | list | quit");
}
