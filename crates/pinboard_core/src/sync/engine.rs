//! Per-session synchronization engine.
//!
//! # Responsibility
//! - Own the session's ordered view of one board's notes.
//! - Issue create/move/delete writes against the note store.
//! - Merge the store's change notifications into local state, in order.
//!
//! # Invariants
//! - The note list is mutated only through the watch sender, one change at a
//!   time, so the pump and direct mutations never interleave mid-change.
//! - In `Notified` mode writes never touch the local list; their echo does.
//! - At most one subscription per engine; it is released by `teardown` or
//!   when the engine is dropped.
//! - No public operation returns an error or panics on store failure.
//!
//! # See also
//! - `crate::sync::note_list` for the ordering and merge rules.

use crate::config::{BoardId, ConfigError, EngineConfig, SyncMode};
use crate::model::note::{validate_position, Note, NoteDraft, NoteId};
use crate::store::{NoteChange, NoteStore, Subscription, SubscriptionEvent};
use crate::sync::note_list::NoteList;
use crate::sync::observer::{LogObserver, SyncObserver, SyncOperation};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observable board state exposed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    /// Notes ordered by `created_at` ascending.
    pub notes: NoteList,
    /// `false` until the initial load finished (successfully or not).
    pub ready: bool,
}

enum Lifecycle {
    Idle,
    Initializing,
    Running(Option<JoinHandle<()>>),
    TornDown,
}

/// Shared handles the notification pump needs.
struct PumpContext<S> {
    store: Arc<S>,
    board_id: BoardId,
    state: Arc<watch::Sender<BoardState>>,
    observer: Arc<dyn SyncObserver>,
    cancel: CancellationToken,
}

/// Synchronization engine for one client session and one board.
pub struct SyncEngine<S: NoteStore + 'static> {
    store: Arc<S>,
    config: EngineConfig,
    observer: Arc<dyn SyncObserver>,
    state: Arc<watch::Sender<BoardState>>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
}

impl<S: NoteStore + 'static> SyncEngine<S> {
    /// Creates an idle engine. Nothing is loaded until [`Self::initialize`].
    ///
    /// # Errors
    /// - Returns `ConfigError` when `config` fails validation.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(BoardState::default());
        Ok(Self {
            store,
            config,
            observer: Arc::new(LogObserver),
            state: Arc::new(state),
            lifecycle: Mutex::new(Lifecycle::Idle),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the default log-only failure observer.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board_id(&self) -> &BoardId {
        &self.config.board_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Current notes, ascending by `created_at`.
    pub fn notes(&self) -> Vec<Note> {
        self.state.borrow().notes.as_slice().to_vec()
    }

    pub fn note(&self, id: NoteId) -> Option<Note> {
        self.state.borrow().notes.get(id).cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    /// Receiver that is notified after every state change.
    pub fn watch(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Loads the board and starts following its changes.
    ///
    /// The subscription is taken before the load so nothing committed in
    /// between is missed; buffered changes are replayed onto the loaded list.
    /// Only the first call has any effect. Load failure still ends in
    /// `ready == true` with an empty list.
    pub async fn initialize(&self) {
        {
            let mut lifecycle = self.lock_lifecycle();
            if !matches!(*lifecycle, Lifecycle::Idle) {
                debug!(
                    "event=sync_init module=sync status=skipped reason=already_started board_id={}",
                    self.config.board_id
                );
                return;
            }
            *lifecycle = Lifecycle::Initializing;
        }

        let started_at = Instant::now();
        let board_id = &self.config.board_id;
        let subscription = match self.config.mode {
            SyncMode::LocalOnly => None,
            SyncMode::Notified => match self.store.subscribe(board_id).await {
                Ok(subscription) => Some(subscription),
                Err(err) => {
                    self.observer.store_failure(SyncOperation::Subscribe, &err);
                    None
                }
            },
        };

        let (loaded, load_status) = match self.store.list_notes(board_id).await {
            Ok(notes) => (notes, "ok"),
            Err(err) => {
                self.observer.store_failure(SyncOperation::Initialize, &err);
                (Vec::new(), "degraded")
            }
        };
        let loaded_count = loaded.len();
        self.state.send_modify(|state| {
            state.notes.replace_all(loaded);
            state.ready = true;
        });
        info!(
            "event=sync_init module=sync status={} board_id={} mode={:?} live={} notes={} duration_ms={}",
            load_status,
            board_id,
            self.config.mode,
            subscription.is_some(),
            loaded_count,
            started_at.elapsed().as_millis()
        );

        let mut lifecycle = self.lock_lifecycle();
        if !matches!(*lifecycle, Lifecycle::Initializing) || self.cancel.is_cancelled() {
            // Torn down while loading; the subscription is dropped here.
            return;
        }
        let pump = subscription.map(|subscription| {
            let context = PumpContext {
                store: Arc::clone(&self.store),
                board_id: board_id.clone(),
                state: Arc::clone(&self.state),
                observer: Arc::clone(&self.observer),
                cancel: self.cancel.clone(),
            };
            tokio::spawn(run_pump(context, subscription))
        });
        *lifecycle = Lifecycle::Running(pump);
    }

    /// Validates input, assigns cosmetics and writes a new note.
    ///
    /// Returns the store-assigned id, or `None` when validation or the write
    /// failed. The note appears locally once its change notification arrives
    /// (immediately in `LocalOnly` mode).
    pub async fn add_note(
        &self,
        heading: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> Option<NoteId> {
        let draft = match NoteDraft::new(heading, body, image_url) {
            Ok(draft) => draft,
            Err(err) => {
                self.observer
                    .validation_rejected(SyncOperation::AddNote, &err);
                return None;
            }
        };
        let new_note =
            draft.with_random_cosmetics(&mut rand::thread_rng(), &self.config.placement);

        match self
            .store
            .insert_note(&self.config.board_id, new_note)
            .await
        {
            Ok(note) => {
                let id = note.id;
                debug!(
                    "event=note_add module=sync status=ok board_id={} note_id={} color={}",
                    self.config.board_id, id, note.color
                );
                self.apply_if_local(NoteChange::Created { note });
                Some(id)
            }
            Err(err) => {
                self.observer.store_failure(SyncOperation::AddNote, &err);
                None
            }
        }
    }

    /// Deletes a note. Unknown ids are a no-op.
    pub async fn delete_note(&self, id: NoteId) {
        match self.store.delete_note(id).await {
            Ok(()) => self.apply_if_local(NoteChange::Deleted { id }),
            Err(err) => self.observer.store_failure(SyncOperation::DeleteNote, &err),
        }
    }

    /// Persists a note's resting position after a drag.
    ///
    /// Failures are reported to the observer only; nothing is rolled back.
    pub async fn update_note_position(&self, id: NoteId, x: f64, y: f64) {
        if let Err(err) = validate_position(x, y) {
            self.observer
                .validation_rejected(SyncOperation::UpdateNotePosition, &err);
            return;
        }

        match self.store.update_note_position(id, x, y).await {
            Ok(()) => {
                if let Some(current) = self.note(id) {
                    self.apply_if_local(NoteChange::Updated {
                        note: current.moved_to(x, y),
                    });
                }
            }
            Err(err) => self
                .observer
                .store_failure(SyncOperation::UpdateNotePosition, &err),
        }
    }

    /// Stops following changes and releases the subscription.
    ///
    /// Waits for the notification pump to exit. Safe to call repeatedly; the
    /// engine cannot be initialized again afterwards.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::TornDown);
        let pump = match previous {
            Lifecycle::Running(pump) => pump,
            Lifecycle::TornDown => return,
            Lifecycle::Idle | Lifecycle::Initializing => None,
        };

        if let Some(handle) = pump {
            if let Err(err) = handle.await {
                warn!(
                    "event=sync_teardown module=sync status=error board_id={} error={}",
                    self.config.board_id, err
                );
            }
        }
        info!(
            "event=sync_teardown module=sync status=ok board_id={}",
            self.config.board_id
        );
    }

    fn apply_if_local(&self, change: NoteChange) {
        if self.config.mode == SyncMode::LocalOnly {
            apply_change(&self.state, &change);
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: NoteStore + 'static> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Lifecycle::Running(Some(handle)) = lifecycle {
            handle.abort();
        }
    }
}

fn apply_change(state: &watch::Sender<BoardState>, change: &NoteChange) {
    let changed = state.send_if_modified(|board| board.notes.apply(change));
    debug!(
        "event=note_change_applied module=sync status={} kind={:?} note_id={}",
        if changed { "ok" } else { "no_op" },
        change.kind(),
        change.note_id()
    );
}

async fn run_pump<S: NoteStore + 'static>(context: PumpContext<S>, mut subscription: Subscription) {
    loop {
        let event = tokio::select! {
            biased;
            () = context.cancel.cancelled() => break,
            event = subscription.next() => event,
        };

        match event {
            Some(SubscriptionEvent::Change(change)) => apply_change(&context.state, &change),
            Some(SubscriptionEvent::Lagged(skipped)) => {
                warn!(
                    "event=subscription_lagged module=sync status=resync board_id={} skipped={}",
                    context.board_id, skipped
                );
                tokio::select! {
                    biased;
                    () = context.cancel.cancelled() => break,
                    () = resync(&context) => {}
                }
            }
            None => {
                warn!(
                    "event=subscription_closed module=sync status=stopped board_id={}",
                    context.board_id
                );
                break;
            }
        }
    }
}

async fn resync<S: NoteStore>(context: &PumpContext<S>) {
    match context.store.list_notes(&context.board_id).await {
        Ok(notes) => {
            let count = notes.len();
            context.state.send_modify(|board| board.notes.replace_all(notes));
            info!(
                "event=sync_resync module=sync status=ok board_id={} notes={}",
                context.board_id, count
            );
        }
        Err(err) => context
            .observer
            .store_failure(SyncOperation::Resync, &err),
    }
}
