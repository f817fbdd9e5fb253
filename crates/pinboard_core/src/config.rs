//! Engine configuration.
//!
//! # Responsibility
//! - Describe which board a session follows and how new notes are placed.
//! - Select between notification-driven and local-only sync modes.
//!
//! # Invariants
//! - Every field has a default, so partial documents deserialize.
//! - A placement region is only used after `validate()` accepted it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_BOARD_ID: &str = "default";
const DEFAULT_PLACEMENT_MIN: f64 = 50.0;
const DEFAULT_PLACEMENT_MAX: f64 = 250.0;

/// Identifier of the board whose notes a session follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl BoardId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BoardId {
    fn default() -> Self {
        Self(DEFAULT_BOARD_ID.to_string())
    }
}

impl Display for BoardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How local state learns about writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Local list changes only when the store's change notification arrives.
    #[default]
    Notified,
    /// No notification channel; successful writes are applied immediately.
    LocalOnly,
}

/// Rectangle in which freshly created notes are placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRegion {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for PlacementRegion {
    fn default() -> Self {
        Self {
            min_x: DEFAULT_PLACEMENT_MIN,
            max_x: DEFAULT_PLACEMENT_MAX,
            min_y: DEFAULT_PLACEMENT_MIN,
            max_y: DEFAULT_PLACEMENT_MAX,
        }
    }
}

impl PlacementRegion {
    /// Checks bounds are finite and not inverted. A zero-width axis is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [self.min_x, self.max_x, self.min_y, self.max_y];
        if bounds.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::InvalidPlacement(
                "placement bounds must be finite".to_string(),
            ));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(ConfigError::InvalidPlacement(format!(
                "placement bounds are inverted: x {}..{}, y {}..{}",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        // Sampling needs the width of each axis to be representable.
        if !(self.max_x - self.min_x).is_finite() || !(self.max_y - self.min_y).is_finite() {
            return Err(ConfigError::InvalidPlacement(
                "placement region is too wide to sample".to_string(),
            ));
        }
        Ok(())
    }

    /// Draws one point uniformly from the region (inclusive bounds).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        let x = rng.gen_range(self.min_x..=self.max_x);
        let y = rng.gen_range(self.min_y..=self.max_y);
        (x, y)
    }
}

/// Per-session engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub board_id: BoardId,
    pub placement: PlacementRegion,
    pub mode: SyncMode,
}

impl EngineConfig {
    /// Default config bound to `board_id`.
    pub fn for_board(board_id: impl Into<String>) -> Self {
        Self {
            board_id: BoardId::new(board_id),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_placement(mut self, placement: PlacementRegion) -> Self {
        self.placement = placement;
        self
    }

    /// Validates every field that has constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_id.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyBoardId);
        }
        self.placement.validate()
    }
}

/// Configuration rejected by `EngineConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyBoardId,
    InvalidPlacement(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBoardId => write!(f, "board id must not be empty"),
            Self::InvalidPlacement(details) => write!(f, "invalid placement region: {details}"),
        }
    }
}

impl Error for ConfigError {}
