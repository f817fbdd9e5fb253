//! SQLite-backed note store with in-process change fan-out.
//!
//! # Responsibility
//! - Persist notes in the `notes` table, scoped by board.
//! - Broadcast every committed change to subscribers of the affected board.
//!
//! # Invariants
//! - Broadcasts are sent while the connection lock is held, so subscribers
//!   observe changes in commit order.
//! - `created_at` is strictly increasing across inserts of one store.
//! - Listing order is `created_at ASC, rowid ASC`.

use crate::config::BoardId;
use crate::db::{open_db, open_db_in_memory};
use crate::model::note::{NewNote, Note, NoteColor, NoteId};
use crate::store::{NoteChange, NoteStore, StoreError, StoreResult, Subscription};
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default per-board buffer of undelivered changes per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    heading,
    body,
    image_url,
    x,
    y,
    color,
    created_at
FROM notes";

struct Storage {
    conn: Connection,
    last_created_at: i64,
}

/// Note store over one SQLite connection.
///
/// Queries run on the calling task while holding an internal lock; they are
/// single-row or single-board statements and do not block for long.
pub struct SqliteNoteStore {
    storage: Mutex<Storage>,
    channels: Mutex<HashMap<BoardId, broadcast::Sender<NoteChange>>>,
    channel_capacity: usize,
}

impl SqliteNoteStore {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: Connection) -> StoreResult<Self> {
        Self::with_channel_capacity(conn, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Same as [`SqliteNoteStore::new`] with a custom subscriber buffer.
    ///
    /// A subscriber that falls more than `capacity` changes behind receives a
    /// lag signal instead of the dropped changes.
    pub fn with_channel_capacity(conn: Connection, capacity: usize) -> StoreResult<Self> {
        let last_created_at: Option<i64> =
            conn.query_row("SELECT MAX(created_at) FROM notes;", [], |row| row.get(0))?;
        Ok(Self {
            storage: Mutex::new(Storage {
                conn,
                last_created_at: last_created_at.unwrap_or(0),
            }),
            channels: Mutex::new(HashMap::new()),
            channel_capacity: capacity.max(1),
        })
    }

    /// Opens a file-backed store, creating and migrating the file as needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(open_db(path)?)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(open_db_in_memory()?)
    }

    /// Number of live subscriptions for `board_id`.
    pub fn subscriber_count(&self, board_id: &BoardId) -> usize {
        self.lock_channels()
            .map(|channels| {
                channels
                    .get(board_id)
                    .map_or(0, broadcast::Sender::receiver_count)
            })
            .unwrap_or(0)
    }

    fn lock_storage(&self) -> StoreResult<MutexGuard<'_, Storage>> {
        self.storage
            .lock()
            .map_err(|_| StoreError::Unavailable("note storage lock poisoned".to_string()))
    }

    fn lock_channels(
        &self,
    ) -> StoreResult<MutexGuard<'_, HashMap<BoardId, broadcast::Sender<NoteChange>>>> {
        self.channels
            .lock()
            .map_err(|_| StoreError::Unavailable("note channel lock poisoned".to_string()))
    }

    fn publish(&self, board_id: &BoardId, change: NoteChange) {
        let Ok(channels) = self.lock_channels() else {
            return;
        };
        let Some(sender) = channels.get(board_id) else {
            return;
        };
        let kind = change.kind();
        let note_id = change.note_id();
        // Err only means nobody is listening right now.
        let delivered = sender.send(change).unwrap_or(0);
        debug!(
            "event=note_publish module=store status=ok board_id={} kind={:?} note_id={} receivers={}",
            board_id, kind, note_id, delivered
        );
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn list_notes(&self, board_id: &BoardId) -> StoreResult<Vec<Note>> {
        let storage = self.lock_storage()?;
        let mut stmt = storage.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} WHERE board_id = ?1 ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([board_id.as_str()])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    async fn insert_note(&self, board_id: &BoardId, note: NewNote) -> StoreResult<Note> {
        let mut storage = self.lock_storage()?;
        let created_at = now_epoch_ms().max(storage.last_created_at + 1);
        let record = Note {
            id: Uuid::new_v4(),
            heading: note.heading,
            body: note.body,
            image_url: note.image_url,
            x: note.x,
            y: note.y,
            color: note.color,
            created_at,
        };

        storage.conn.execute(
            "INSERT INTO notes (
                id,
                board_id,
                heading,
                body,
                image_url,
                x,
                y,
                color,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                record.id.to_string(),
                board_id.as_str(),
                record.heading,
                record.body,
                record.image_url,
                record.x,
                record.y,
                record.color.as_str(),
                record.created_at,
            ],
        )?;
        storage.last_created_at = created_at;

        info!(
            "event=note_insert module=store status=ok board_id={} note_id={}",
            board_id, record.id
        );
        self.publish(
            board_id,
            NoteChange::Created {
                note: record.clone(),
            },
        );
        Ok(record)
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        let storage = self.lock_storage()?;
        let id_text = id.to_string();
        let board_id: Option<String> = storage
            .conn
            .query_row(
                "SELECT board_id FROM notes WHERE id = ?1;",
                [id_text.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(board_id) = board_id.map(BoardId::new) else {
            debug!("event=note_delete module=store status=skipped reason=unknown_id note_id={id}");
            return Ok(());
        };

        storage
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id_text.as_str()])?;
        info!(
            "event=note_delete module=store status=ok board_id={} note_id={}",
            board_id, id
        );
        self.publish(&board_id, NoteChange::Deleted { id });
        Ok(())
    }

    async fn update_note_position(&self, id: NoteId, x: f64, y: f64) -> StoreResult<()> {
        let storage = self.lock_storage()?;
        let id_text = id.to_string();
        let changed = storage.conn.execute(
            "UPDATE notes SET x = ?2, y = ?3 WHERE id = ?1;",
            params![id_text, x, y],
        )?;
        if changed == 0 {
            debug!("event=note_move module=store status=skipped reason=unknown_id note_id={id}");
            return Ok(());
        }

        let (board_id, note) = storage.conn.query_row(
            "SELECT board_id, id, heading, body, image_url, x, y, color, created_at
             FROM notes WHERE id = ?1;",
            [id_text.as_str()],
            |row| Ok((row.get::<_, String>("board_id")?, parse_note_row(row))),
        )?;
        let note = note?;
        let board_id = BoardId::new(board_id);
        debug!(
            "event=note_move module=store status=ok board_id={} note_id={}",
            board_id, id
        );
        self.publish(&board_id, NoteChange::Updated { note });
        Ok(())
    }

    async fn subscribe(&self, board_id: &BoardId) -> StoreResult<Subscription> {
        let mut channels = self.lock_channels()?;
        let receiver = channels
            .entry(board_id.clone())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe();
        info!(
            "event=subscribe module=store status=ok board_id={}",
            board_id
        );
        Ok(Subscription::new(board_id.clone(), receiver))
    }
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<Note> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| StoreError::InvalidData(format!("invalid note id `{id_text}`")))?;
    let color_text: String = row.get("color")?;
    let color = NoteColor::parse(&color_text)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown note color `{color_text}`")))?;

    Ok(Note {
        id,
        heading: row.get("heading")?,
        body: row.get("body")?,
        image_url: row.get("image_url")?,
        x: row.get("x")?,
        y: row.get("y")?,
        color,
        created_at: row.get("created_at")?,
    })
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::SqliteNoteStore;
    use crate::config::BoardId;
    use crate::model::note::{NewNote, NoteColor};
    use crate::store::{NoteChange, NoteStore, SubscriptionEvent};

    fn new_note(heading: &str) -> NewNote {
        NewNote {
            heading: heading.to_string(),
            body: "body".to_string(),
            image_url: None,
            x: 60.0,
            y: 70.0,
            color: NoteColor::Mint,
        }
    }

    #[tokio::test]
    async fn created_at_is_strictly_increasing() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let board = BoardId::default();
        let mut previous = i64::MIN;
        for index in 0..20 {
            let note = store
                .insert_note(&board, new_note(&format!("n{index}")))
                .await
                .unwrap();
            assert!(note.created_at > previous);
            previous = note.created_at;
        }
    }

    #[tokio::test]
    async fn changes_only_reach_subscribers_of_the_same_board() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let board_a = BoardId::new("a");
        let board_b = BoardId::new("b");
        let mut sub_b = store.subscribe(&board_b).await.unwrap();

        store.insert_note(&board_a, new_note("on a")).await.unwrap();
        let on_b = store.insert_note(&board_b, new_note("on b")).await.unwrap();

        match sub_b.next().await {
            Some(SubscriptionEvent::Change(NoteChange::Created { note })) => {
                assert_eq!(note.id, on_b.id)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(store.list_notes(&board_a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_blank_heading_at_schema_level() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let err = store
            .insert_note(&BoardId::default(), new_note("   "))
            .await
            .unwrap_err();
        match err {
            crate::store::StoreError::Db(db) => assert!(db.is_constraint_violation()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
