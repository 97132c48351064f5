//! Per-book review record.
//!
//! # Invariants
//! - `BookId` can only hold non-negative values.
//! - At most one `Review` exists per `BookId`; the repository enforces it.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Catalog book identifier used as the review key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct BookId(i64);

impl BookId {
    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if raw < 0 {
            return Err(ValidationError::NegativeBookId(raw));
        }
        Ok(Self(raw))
    }

    /// Converts an optional host-supplied id; absence is an error, never `0`.
    pub fn from_optional(raw: Option<i64>) -> Result<Self, ValidationError> {
        match raw {
            Some(value) => Self::new(value),
            None => Err(ValidationError::MissingBookId),
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for BookId {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BookId> for i64 {
    fn from(value: BookId) -> Self {
        value.0
    }
}

impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User review attached to one book. `text` is `None` when nothing is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub book_id: BookId,
    pub text: Option<String>,
}

impl Review {
    pub fn new(book_id: BookId, text: impl Into<String>) -> Self {
        Self {
            book_id,
            text: Some(text.into()),
        }
    }

    /// Value returned for a lookup miss.
    pub fn empty(book_id: BookId) -> Self {
        Self {
            book_id,
            text: None,
        }
    }

    /// Text to pre-fill an edit surface with.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{BookId, Review};
    use crate::model::ValidationError;

    #[test]
    fn book_id_rejects_negative_and_missing_values() {
        assert_eq!(BookId::new(-1), Err(ValidationError::NegativeBookId(-1)));
        assert_eq!(
            BookId::from_optional(None),
            Err(ValidationError::MissingBookId)
        );
        assert_eq!(BookId::new(0).map(BookId::get), Ok(0));
    }

    #[test]
    fn empty_review_has_no_text() {
        let review = Review::empty(BookId::new(7).unwrap());
        assert_eq!(review.text, None);
        assert_eq!(review.text_or_empty(), "");
    }
}
