//! Ordered, id-unique note list that change notifications are merged into.
//!
//! # Invariants
//! - At most one entry per `NoteId`.
//! - Entries stay sorted by `created_at` ascending; equal timestamps keep
//!   arrival order.
//! - Applying the same change twice leaves the list as applying it once.
//! - Changes to an existing entry only touch `x`/`y`.

use crate::model::note::{Note, NoteId};
use crate::store::NoteChange;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteList {
    notes: Vec<Note>,
}

impl NoteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from an unordered snapshot.
    pub fn from_notes(notes: Vec<Note>) -> Self {
        let mut list = Self::new();
        list.replace_all(notes);
        list
    }

    /// Replaces every entry with `notes`.
    ///
    /// The snapshot is stably sorted by `created_at`; a repeated id keeps its
    /// first occurrence.
    pub fn replace_all(&mut self, mut notes: Vec<Note>) {
        let mut seen = HashSet::with_capacity(notes.len());
        notes.retain(|note| seen.insert(note.id));
        notes.sort_by_key(|note| note.created_at);
        self.notes = notes;
    }

    /// Merges one change. Returns whether the list changed.
    pub fn apply(&mut self, change: &NoteChange) -> bool {
        match change {
            NoteChange::Created { note } => self.upsert(note),
            NoteChange::Updated { note } => self.update(note),
            NoteChange::Deleted { id } => self.remove(*id),
        }
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn as_slice(&self) -> &[Note] {
        &self.notes
    }

    pub fn ids(&self) -> Vec<NoteId> {
        self.notes.iter().map(|note| note.id).collect()
    }

    fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|note| note.id == id)
    }

    fn upsert(&mut self, note: &Note) -> bool {
        if let Some(index) = self.position(note.id) {
            return merge_position(&mut self.notes[index], note);
        }

        let index = self
            .notes
            .partition_point(|existing| existing.created_at <= note.created_at);
        self.notes.insert(index, note.clone());
        true
    }

    fn update(&mut self, note: &Note) -> bool {
        match self.position(note.id) {
            Some(index) => merge_position(&mut self.notes[index], note),
            None => false,
        }
    }

    fn remove(&mut self, id: NoteId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.notes.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<'a> IntoIterator for &'a NoteList {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}

/// Copies the mutable position onto an existing entry. Every other field is
/// fixed at creation, so a differing echo cannot reorder the list.
fn merge_position(slot: &mut Note, incoming: &Note) -> bool {
    if slot.x == incoming.x && slot.y == incoming.y {
        return false;
    }
    slot.x = incoming.x;
    slot.y = incoming.y;
    true
}
