//! Domain model for search history, reviews and catalog books.
//!
//! # Responsibility
//! - Define the records persisted by the repositories.
//! - Define the transient `BookSummary` projection shown in result lists.
//!
//! # Invariants
//! - History keywords are never empty.
//! - Book ids are non-negative; there is no sentinel id.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod book;
pub mod history;
pub mod review;

/// Input rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// History keyword is empty or whitespace-only.
    EmptyKeyword,
    /// Book id is negative.
    NegativeBookId(i64),
    /// Caller could not supply a book id at all.
    MissingBookId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKeyword => write!(f, "history keyword cannot be empty"),
            Self::NegativeBookId(value) => write!(f, "book id must be non-negative, got {value}"),
            Self::MissingBookId => write!(f, "book id is required"),
        }
    }
}

impl Error for ValidationError {}
