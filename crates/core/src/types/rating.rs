//! Item ratings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{ItemId, RatingId, UserId};

/// Rejected rating score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("score must be between 0 and {max} (got {got})", max = Score::MAX)]
pub struct ScoreError {
    pub got: u8,
}

/// A rating score from 0 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    /// Highest accepted score.
    pub const MAX: u8 = 5;

    /// Validate a score.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError` when `value` exceeds [`Score::MAX`].
    pub const fn new(value: u8) -> Result<Self, ScoreError> {
        if value > Self::MAX {
            return Err(ScoreError { got: value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// A rating left by a player on an item they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Option<RatingId>,
    pub score: Score,
    pub comment: String,
    pub author: Option<UserId>,
    pub item: Option<ItemId>,
}
