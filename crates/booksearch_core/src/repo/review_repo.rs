//! Review repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Look up the single review stored for a book.
//! - Insert or replace that review.
//!
//! # Invariants
//! - `bookId` is the primary key; saves use upsert so a book never owns
//!   two rows.
//! - A lookup miss resolves to `Review::empty`, not an error.

use super::{ensure_table_ready, RepoError, RepoResult};
use crate::model::review::{BookId, Review};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

const REVIEW_TABLE: &str = "review";

/// Repository interface for per-book reviews.
pub trait ReviewRepository {
    /// Returns the stored review, or an empty one when nothing was saved.
    fn get_review(&self, book_id: BookId) -> RepoResult<Review>;
    /// Inserts or overwrites the review for `review.book_id`.
    fn save_review(&self, review: &Review) -> RepoResult<()>;
}

/// SQLite-backed review repository.
pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, REVIEW_TABLE, &["bookId", "review"])?;
        Ok(Self { conn })
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn get_review(&self, book_id: BookId) -> RepoResult<Review> {
        let stored = self
            .conn
            .query_row(
                "SELECT bookId, review FROM review WHERE bookId = ?1;",
                params![book_id.get()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        match stored {
            Some((raw_id, text)) => {
                let stored_id = BookId::new(raw_id).map_err(|_| {
                    RepoError::InvalidData(format!("invalid bookId `{raw_id}` in review"))
                })?;
                Ok(Review {
                    book_id: stored_id,
                    text,
                })
            }
            None => {
                debug!("event=review_get module=repo status=miss book_id={book_id}");
                Ok(Review::empty(book_id))
            }
        }
    }

    fn save_review(&self, review: &Review) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO review (bookId, review) VALUES (?1, ?2)
             ON CONFLICT(bookId) DO UPDATE SET review = excluded.review;",
            params![review.book_id.get(), review.text.as_deref()],
        )?;
        debug!(
            "event=review_save module=repo status=ok book_id={}",
            review.book_id
        );
        Ok(())
    }
}
