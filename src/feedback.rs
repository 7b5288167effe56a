//! Feedback
//!
//! Guest feedback aggregation behind an injected repository, so callers
//! can swap storage and tests stay isolated. Read-only snapshots feed
//! external reporting; replying and moderation are not modeled here.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guests::GuestId;

/// Errors related to the feedback repository.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// Referenced a feedback id the repository does not hold.
    #[error("feedback {0} is unknown")]
    UnknownFeedback(FeedbackId),
}

/// Feedback id, unique within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(pub u64);

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A guest's rating and comments for a stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    id: FeedbackId,
    guest: GuestId,
    rating: u8,
    comments: String,
}

impl Feedback {
    /// Create a feedback entry. Ratings are conventionally 1–5; the value
    /// is stored as given.
    pub fn new(id: FeedbackId, guest: GuestId, rating: u8, comments: impl Into<String>) -> Self {
        Feedback {
            id,
            guest,
            rating,
            comments: comments.into(),
        }
    }

    /// The feedback id.
    pub fn id(&self) -> FeedbackId {
        self.id
    }

    /// The guest who left the feedback.
    pub fn guest(&self) -> GuestId {
        self.guest
    }

    /// The rating.
    pub fn rating(&self) -> u8 {
        self.rating
    }

    /// The free-text comments.
    pub fn comments(&self) -> &str {
        &self.comments
    }
}

/// Aggregate snapshot over all feedback in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackTrends {
    /// Number of feedback entries.
    pub total: usize,

    /// Mean rating, absent when there is no feedback.
    pub average_rating: Option<Decimal>,
}

/// Repository of guest feedback.
///
/// Injected rather than global, so aggregation stays queryable
/// process-wide without module-level mutable state.
pub trait FeedbackStore {
    /// Store a feedback entry.
    fn add(&mut self, feedback: Feedback);

    /// Delete a feedback entry.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::UnknownFeedback`] if the id is not held.
    fn remove(&mut self, id: FeedbackId) -> Result<(), FeedbackError>;

    /// Number of entries held.
    fn len(&self) -> usize;

    /// Whether the repository holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All feedback left by one guest, in insertion order.
    fn by_guest(&self, guest: GuestId) -> Vec<&Feedback>;

    /// All feedback rated at or above a floor, in insertion order.
    fn with_min_rating(&self, min_rating: u8) -> Vec<&Feedback>;

    /// Mean rating across all entries, absent when empty.
    fn average_rating(&self) -> Option<Decimal>;

    /// Aggregate snapshot for trend reporting.
    fn trends(&self) -> FeedbackTrends {
        FeedbackTrends {
            total: self.len(),
            average_rating: self.average_rating(),
        }
    }
}

/// In-memory feedback repository backed by a vector.
#[derive(Debug, Default)]
pub struct InMemoryFeedbackStore {
    entries: Vec<Feedback>,
}

impl InMemoryFeedbackStore {
    /// Create an empty repository.
    pub fn new() -> Self {
        InMemoryFeedbackStore::default()
    }
}

impl FeedbackStore for InMemoryFeedbackStore {
    fn add(&mut self, feedback: Feedback) {
        self.entries.push(feedback);
    }

    fn remove(&mut self, id: FeedbackId) -> Result<(), FeedbackError> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(FeedbackError::UnknownFeedback(id))?;

        self.entries.remove(position);

        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn by_guest(&self, guest: GuestId) -> Vec<&Feedback> {
        self.entries
            .iter()
            .filter(|entry| entry.guest == guest)
            .collect()
    }

    fn with_min_rating(&self, min_rating: u8) -> Vec<&Feedback> {
        self.entries
            .iter()
            .filter(|entry| entry.rating >= min_rating)
            .collect()
    }

    fn average_rating(&self) -> Option<Decimal> {
        if self.entries.is_empty() {
            return None;
        }

        let total: u64 = self.entries.iter().map(|entry| u64::from(entry.rating)).sum();

        Decimal::from(total).checked_div(Decimal::from(self.entries.len()))
    }
}
