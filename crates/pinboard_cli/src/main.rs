//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `pinboard_core` wiring end to end: store, two sessions, echo.
//! - Keep output deterministic apart from generated ids and positions.
//!
//! Usage: `pinboard_cli [DB_PATH] [LOG_DIR]` (in-memory store when the path
//! is omitted or `-`; file logging only when `LOG_DIR` is given).

use pinboard_core::{
    default_log_level, init_logging, EngineConfig, NoteStore, SqliteNoteStore, SyncEngine,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const ECHO_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("pinboard_core ping={}", pinboard_core::ping());
    println!("pinboard_core version={}", pinboard_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(raw_dir) = args.get(1) {
        let log_dir = match resolve_log_dir(raw_dir) {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("failed to resolve log dir: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
            eprintln!("failed to init logging: {err}");
            return ExitCode::FAILURE;
        }
        println!("logging level={} dir={}", default_log_level(), log_dir.display());
    }

    let store = match args.first().map(String::as_str) {
        Some(path) if path != "-" => SqliteNoteStore::open(path),
        _ => SqliteNoteStore::open_in_memory(),
    };
    let store = match store {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("failed to open note store: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Logging requires an absolute directory; relative input is taken from the
/// current working directory.
fn resolve_log_dir(raw: &str) -> std::io::Result<PathBuf> {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn run<S: NoteStore + 'static>(store: Arc<S>) -> Result<(), String> {
    let writer = SyncEngine::new(Arc::clone(&store), EngineConfig::default())
        .map_err(|err| err.to_string())?;
    let reader = SyncEngine::new(store, EngineConfig::default()).map_err(|err| err.to_string())?;
    writer.initialize().await;
    reader.initialize().await;

    let id = writer
        .add_note("Smoke test", "Pinned from the CLI", None)
        .await
        .ok_or("add_note failed")?;

    let mut watch = reader.watch();
    tokio::time::timeout(ECHO_TIMEOUT, watch.wait_for(|state| state.notes.contains(id)))
        .await
        .map_err(|_| "change notification did not arrive in time".to_string())?
        .map_err(|err| err.to_string())?;

    for note in reader.notes() {
        println!(
            "note id={} color={} x={:.1} y={:.1} heading={:?}",
            note.id, note.color, note.x, note.y, note.heading
        );
    }

    writer.teardown().await;
    reader.teardown().await;
    Ok(())
}
