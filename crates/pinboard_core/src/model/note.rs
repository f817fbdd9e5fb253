//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical pinned-note record shared by store and engine.
//! - Validate user input before anything reaches persistence.
//! - Assign cosmetic attributes (color, initial placement) exactly once.
//!
//! # Invariants
//! - `id`, `color` and `created_at` never change after creation.
//! - `heading` and `body` are non-empty after trimming and within length caps.
//! - Only `x`/`y` are mutable after creation.
//!
//! # See also
//! - `crate::store::NoteStore` for persistence of these records.

use crate::config::PlacementRegion;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Maximum heading length, counted in chars after trimming.
pub const HEADING_MAX_CHARS: usize = 50;
/// Maximum body length, counted in chars after trimming.
pub const BODY_MAX_CHARS: usize = 500;

/// Stable identifier assigned by the note store at creation time.
pub type NoteId = Uuid;

/// Cosmetic note color. Assigned once when a note is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteColor {
    Yellow,
    Pink,
    Blue,
    Green,
    Lavender,
    Peach,
    Mint,
}

impl NoteColor {
    /// Every color a note can be assigned, in declaration order.
    pub const ALL: [NoteColor; 7] = [
        NoteColor::Yellow,
        NoteColor::Pink,
        NoteColor::Blue,
        NoteColor::Green,
        NoteColor::Lavender,
        NoteColor::Peach,
        NoteColor::Mint,
    ];

    /// Returns the persisted text form (`yellow`, `pink`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Lavender => "lavender",
            Self::Peach => "peach",
            Self::Mint => "mint",
        }
    }

    /// Parses the persisted text form. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == value)
    }

    /// Picks one color uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL
            .choose(rng)
            .unwrap_or(&NoteColor::Yellow)
    }
}

impl Display for NoteColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical pinned note as persisted and broadcast.
///
/// Serialized field names match the persisted record shape
/// (`image_url`, `created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned stable id.
    pub id: NoteId,
    /// Short title, at most 50 chars.
    pub heading: String,
    /// Note text, at most 500 chars.
    pub body: String,
    /// Optional image link; `None` means no image.
    pub image_url: Option<String>,
    /// Canvas x coordinate.
    pub x: f64,
    /// Canvas y coordinate.
    pub y: f64,
    /// Cosmetic color, immutable.
    pub color: NoteColor,
    /// Unix epoch milliseconds. Defines canonical ordering.
    pub created_at: i64,
}

impl Note {
    /// Returns a copy with the position replaced and every other field kept.
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..self.clone()
        }
    }
}

/// Validation failures for note input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyHeading,
    EmptyBody,
    HeadingTooLong { len: usize, max: usize },
    BodyTooLong { len: usize, max: usize },
    NonFiniteCoordinate,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHeading => write!(f, "heading must not be empty"),
            Self::EmptyBody => write!(f, "body must not be empty"),
            Self::HeadingTooLong { len, max } => {
                write!(f, "heading has {len} chars; at most {max} allowed")
            }
            Self::BodyTooLong { len, max } => {
                write!(f, "body has {len} chars; at most {max} allowed")
            }
            Self::NonFiniteCoordinate => write!(f, "note coordinates must be finite numbers"),
        }
    }
}

impl Error for NoteValidationError {}

/// Validated note creation input.
///
/// Only constructible through [`NoteDraft::new`], so holding a draft proves
/// the text fields passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    heading: String,
    body: String,
    image_url: Option<String>,
}

impl NoteDraft {
    /// Trims and validates raw form input.
    ///
    /// # Errors
    /// - Returns `EmptyHeading`/`EmptyBody` when the trimmed value is empty.
    /// - Returns `HeadingTooLong`/`BodyTooLong` when the trimmed value exceeds
    ///   its char cap.
    ///
    /// A blank `image_url` is normalized to `None`.
    pub fn new(
        heading: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> Result<Self, NoteValidationError> {
        let heading = heading.trim();
        let body = body.trim();

        if heading.is_empty() {
            return Err(NoteValidationError::EmptyHeading);
        }
        if body.is_empty() {
            return Err(NoteValidationError::EmptyBody);
        }

        let heading_len = heading.chars().count();
        if heading_len > HEADING_MAX_CHARS {
            return Err(NoteValidationError::HeadingTooLong {
                len: heading_len,
                max: HEADING_MAX_CHARS,
            });
        }
        let body_len = body.chars().count();
        if body_len > BODY_MAX_CHARS {
            return Err(NoteValidationError::BodyTooLong {
                len: body_len,
                max: BODY_MAX_CHARS,
            });
        }

        let image_url = image_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            heading: heading.to_string(),
            body: body.to_string(),
            image_url,
        })
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Attaches cosmetic attributes, producing the store insert payload.
    ///
    /// Color is uniform over [`NoteColor::ALL`]; position is uniform inside
    /// `region`.
    pub fn with_random_cosmetics<R: Rng>(
        self,
        rng: &mut R,
        region: &PlacementRegion,
    ) -> NewNote {
        let (x, y) = region.sample(rng);
        NewNote {
            heading: self.heading,
            body: self.body,
            image_url: self.image_url,
            x,
            y,
            color: NoteColor::random(rng),
        }
    }
}

/// Insert payload handed to the note store.
///
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    pub heading: String,
    pub body: String,
    pub image_url: Option<String>,
    pub x: f64,
    pub y: f64,
    pub color: NoteColor,
}

/// Rejects NaN or infinite canvas coordinates.
pub fn validate_position(x: f64, y: f64) -> Result<(), NoteValidationError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(NoteValidationError::NonFiniteCoordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        validate_position, NoteColor, NoteDraft, NoteValidationError, BODY_MAX_CHARS,
        HEADING_MAX_CHARS,
    };
    use crate::config::PlacementRegion;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draft_trims_text_and_drops_blank_image() {
        let draft = NoteDraft::new("  Groceries ", "\tMilk, eggs\n", Some("   ")).unwrap();
        assert_eq!(draft.heading(), "Groceries");
        assert_eq!(draft.body(), "Milk, eggs");
        assert_eq!(draft.image_url(), None);
    }

    #[test]
    fn draft_rejects_blank_fields() {
        assert_eq!(
            NoteDraft::new("   ", "body", None).unwrap_err(),
            NoteValidationError::EmptyHeading
        );
        assert_eq!(
            NoteDraft::new("heading", "\n\t", None).unwrap_err(),
            NoteValidationError::EmptyBody
        );
    }

    #[test]
    fn draft_counts_chars_not_bytes() {
        let heading = "é".repeat(HEADING_MAX_CHARS);
        assert!(NoteDraft::new(&heading, "ok", None).is_ok());

        let too_long = "é".repeat(HEADING_MAX_CHARS + 1);
        assert_eq!(
            NoteDraft::new(&too_long, "ok", None).unwrap_err(),
            NoteValidationError::HeadingTooLong {
                len: HEADING_MAX_CHARS + 1,
                max: HEADING_MAX_CHARS,
            }
        );

        let body = "b".repeat(BODY_MAX_CHARS + 1);
        assert!(matches!(
            NoteDraft::new("h", &body, None),
            Err(NoteValidationError::BodyTooLong { .. })
        ));
    }

    #[test]
    fn cosmetics_stay_inside_region() {
        let mut rng = StdRng::seed_from_u64(7);
        let region = PlacementRegion::default();
        for _ in 0..200 {
            let draft = NoteDraft::new("h", "b", Some("https://example.com/a.png")).unwrap();
            let new_note = draft.with_random_cosmetics(&mut rng, &region);
            assert!((50.0..=250.0).contains(&new_note.x));
            assert!((50.0..=250.0).contains(&new_note.y));
            assert!(NoteColor::ALL.contains(&new_note.color));
            assert_eq!(
                new_note.image_url.as_deref(),
                Some("https://example.com/a.png")
            );
        }
    }

    #[test]
    fn color_text_form_round_trips() {
        for color in NoteColor::ALL {
            assert_eq!(NoteColor::parse(color.as_str()), Some(color));
        }
        assert_eq!(NoteColor::parse("orange"), None);
    }

    #[test]
    fn position_must_be_finite() {
        assert!(validate_position(120.5, 80.0).is_ok());
        assert_eq!(
            validate_position(f64::NAN, 1.0).unwrap_err(),
            NoteValidationError::NonFiniteCoordinate
        );
        assert!(validate_position(1.0, f64::INFINITY).is_err());
    }
}
