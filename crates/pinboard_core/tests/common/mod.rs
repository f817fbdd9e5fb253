#![allow(dead_code)]

use async_trait::async_trait;
use pinboard_core::{
    BoardId, BoardState, NewNote, Note, NoteChange, NoteId, NoteStore, NoteValidationError,
    SqliteNoteStore, StoreError, StoreResult, Subscription, SyncEngine, SyncObserver,
    SyncOperation,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    List,
    Insert(NewNote),
    Delete(NoteId),
    UpdatePosition(NoteId, f64, f64),
    Subscribe,
}

/// SQLite store wrapper that records calls and can fail or mute on demand.
pub struct ScriptedStore {
    inner: SqliteNoteStore,
    calls: Mutex<Vec<StoreCall>>,
    fail_list: AtomicBool,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    fail_update: AtomicBool,
    fail_subscribe: AtomicBool,
    muted: Mutex<Option<broadcast::Sender<NoteChange>>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteNoteStore::open_in_memory().unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_list: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            muted: Mutex::new(None),
        }
    }

    /// Subscriptions handed out from now on only see changes pushed with
    /// [`ScriptedStore::push`].
    pub fn mute_notifications(&self) {
        let (sender, _) = broadcast::channel(64);
        *self.muted.lock().unwrap() = Some(sender);
    }

    pub fn push(&self, change: NoteChange) {
        let muted = self.muted.lock().unwrap();
        muted
            .as_ref()
            .expect("notifications must be muted first")
            .send(change)
            .unwrap();
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &SqliteNoteStore {
        &self.inner
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NoteStore for ScriptedStore {
    async fn list_notes(&self, board_id: &BoardId) -> StoreResult<Vec<Note>> {
        self.record(StoreCall::List);
        Self::check(&self.fail_list)?;
        self.inner.list_notes(board_id).await
    }

    async fn insert_note(&self, board_id: &BoardId, note: NewNote) -> StoreResult<Note> {
        self.record(StoreCall::Insert(note.clone()));
        Self::check(&self.fail_insert)?;
        self.inner.insert_note(board_id, note).await
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        self.record(StoreCall::Delete(id));
        Self::check(&self.fail_delete)?;
        self.inner.delete_note(id).await
    }

    async fn update_note_position(&self, id: NoteId, x: f64, y: f64) -> StoreResult<()> {
        self.record(StoreCall::UpdatePosition(id, x, y));
        Self::check(&self.fail_update)?;
        self.inner.update_note_position(id, x, y).await
    }

    async fn subscribe(&self, board_id: &BoardId) -> StoreResult<Subscription> {
        self.record(StoreCall::Subscribe);
        Self::check(&self.fail_subscribe)?;
        let muted = self
            .muted
            .lock()
            .unwrap()
            .as_ref()
            .map(broadcast::Sender::subscribe);
        match muted {
            Some(receiver) => Ok(Subscription::new(board_id.clone(), receiver)),
            None => self.inner.subscribe(board_id).await,
        }
    }
}

/// Observer that keeps every reported failure.
#[derive(Default)]
pub struct RecordingObserver {
    store_failures: Mutex<Vec<SyncOperation>>,
    rejections: Mutex<Vec<(SyncOperation, NoteValidationError)>>,
}

impl RecordingObserver {
    pub fn store_failures(&self) -> Vec<SyncOperation> {
        self.store_failures.lock().unwrap().clone()
    }

    pub fn rejections(&self) -> Vec<(SyncOperation, NoteValidationError)> {
        self.rejections.lock().unwrap().clone()
    }
}

impl SyncObserver for RecordingObserver {
    fn store_failure(&self, operation: SyncOperation, _error: &StoreError) {
        self.store_failures.lock().unwrap().push(operation);
    }

    fn validation_rejected(&self, operation: SyncOperation, error: &NoteValidationError) {
        self.rejections
            .lock()
            .unwrap()
            .push((operation, error.clone()));
    }
}

/// Waits until the engine state satisfies `predicate`, or panics after 5s.
pub async fn wait_for_state<S, F>(engine: &SyncEngine<S>, mut predicate: F) -> BoardState
where
    S: NoteStore + 'static,
    F: FnMut(&BoardState) -> bool,
{
    let mut receiver = engine.watch();
    let state = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for engine state")
        .expect("engine state channel closed");
    state.clone()
}
