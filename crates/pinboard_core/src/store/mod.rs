//! Note store contract and implementations.
//!
//! # Responsibility
//! - Define the persistence + change-notification collaborator the sync
//!   engine talks to.
//! - Provide a SQLite-backed store that fans out changes in-process.
//!
//! # Invariants
//! - The store assigns `id` and `created_at`; callers never choose them.
//! - Every successful write that changes a row emits exactly one change to
//!   the subscribers of the affected board, in commit order.
//! - Deleting or moving an unknown id succeeds and emits nothing.
//!
//! # See also
//! - `crate::sync::engine` for the consumer side of notifications.

pub mod sqlite_store;
pub mod subscription;

use crate::config::BoardId;
use crate::db::DbError;
use crate::model::note::{NewNote, Note, NoteId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use sqlite_store::SqliteNoteStore;
pub use subscription::{Subscription, SubscriptionEvent};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a note store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Store could not be reached or is shutting down.
    Unavailable(String),
    /// Storage backend rejected the request.
    Db(DbError),
    /// Persisted data does not decode into a valid note.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(details) => write!(f, "note store unavailable: {details}"),
            Self::Db(err) => write!(f, "note store request failed: {err}"),
            Self::InvalidData(details) => write!(f, "invalid persisted note data: {details}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Kind of change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One change notification for a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteChange {
    Created { note: Note },
    Updated { note: Note },
    Deleted { id: NoteId },
}

impl NoteChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Created { .. } => ChangeKind::Created,
            Self::Updated { .. } => ChangeKind::Updated,
            Self::Deleted { .. } => ChangeKind::Deleted,
        }
    }

    /// Id of the note the change applies to.
    pub fn note_id(&self) -> NoteId {
        match self {
            Self::Created { note } | Self::Updated { note } => note.id,
            Self::Deleted { id } => *id,
        }
    }
}

/// Durable note collection with per-board change notification.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Lists every note of `board_id`, ascending by `created_at`.
    async fn list_notes(&self, board_id: &BoardId) -> StoreResult<Vec<Note>>;

    /// Persists a new note and returns it with store-assigned `id`/`created_at`.
    async fn insert_note(&self, board_id: &BoardId, note: NewNote) -> StoreResult<Note>;

    /// Removes one note. Unknown ids succeed without a notification.
    async fn delete_note(&self, id: NoteId) -> StoreResult<()>;

    /// Overwrites the position of one note. Unknown ids succeed without a
    /// notification.
    async fn update_note_position(&self, id: NoteId, x: f64, y: f64) -> StoreResult<()>;

    /// Starts receiving changes for `board_id`. Dropping the returned
    /// subscription unsubscribes.
    async fn subscribe(&self, board_id: &BoardId) -> StoreResult<Subscription>;
}

