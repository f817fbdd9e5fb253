//! Core note state and synchronization for the pinboard.
//! This crate is the single source of truth for note invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;
pub mod sync;

pub use config::{BoardId, ConfigError, EngineConfig, PlacementRegion, SyncMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{
    NewNote, Note, NoteColor, NoteDraft, NoteId, NoteValidationError, BODY_MAX_CHARS,
    HEADING_MAX_CHARS,
};
pub use store::{
    ChangeKind, NoteChange, NoteStore, SqliteNoteStore, StoreError, StoreResult, Subscription,
    SubscriptionEvent,
};
pub use sync::engine::{BoardState, SyncEngine};
pub use sync::note_list::NoteList;
pub use sync::observer::{LogObserver, SyncObserver, SyncOperation};

/// Minimal health-check API for host wiring.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
