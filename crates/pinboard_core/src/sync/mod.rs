//! Client-side note state synchronization.
//!
//! # Responsibility
//! - Keep one session's note list consistent with the note store.
//! - Turn store change notifications into ordered, idempotent list updates.
//! - Report swallowed failures to an observer instead of the caller.
//!
//! # Invariants
//! - At quiescence the local list is set-equal to the store's board contents.
//! - Same-id changes are applied in arrival order; last write wins per field.
//!
//! # See also
//! - `crate::sync::note_list` for the ordering and merge rules.

pub mod engine;
pub mod note_list;
pub mod observer;
