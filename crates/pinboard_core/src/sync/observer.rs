//! Failure reporting hook for the sync engine.
//!
//! Engine operations never return errors to their callers; every failure is
//! handed to a [`SyncObserver`] instead.

use crate::model::note::NoteValidationError;
use crate::store::StoreError;
use log::{error, warn};
use std::fmt::{Display, Formatter};

/// Engine operation a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    Initialize,
    Subscribe,
    AddNote,
    DeleteNote,
    UpdateNotePosition,
    Resync,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Subscribe => "subscribe",
            Self::AddNote => "add_note",
            Self::DeleteNote => "delete_note",
            Self::UpdateNotePosition => "update_note_position",
            Self::Resync => "resync",
        }
    }
}

impl Display for SyncOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives every failure the engine swallows.
pub trait SyncObserver: Send + Sync {
    /// A store call failed; the operation had no effect.
    fn store_failure(&self, operation: SyncOperation, error: &StoreError);

    /// Input was rejected before any store call.
    fn validation_rejected(&self, operation: SyncOperation, error: &NoteValidationError);
}

/// Default observer writing metadata-only log records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn store_failure(&self, operation: SyncOperation, error: &StoreError) {
        error!(
            "event=store_failure module=sync status=error op={} error={}",
            operation, error
        );
    }

    fn validation_rejected(&self, operation: SyncOperation, error: &NoteValidationError) {
        warn!(
            "event=validation_rejected module=sync status=rejected op={} reason={}",
            operation, error
        );
    }
}
