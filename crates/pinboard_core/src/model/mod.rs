//! Domain model for pinned board notes.
//!
//! # Responsibility
//! - Define canonical data structures used by store and sync engine.
//! - Own input validation so no partial note reaches persistence.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.
//! - Deletion is a hard delete; there are no tombstones.
//!
//! # See also
//! - `crate::store::NoteStore` for persistence of these records.

pub mod note;
