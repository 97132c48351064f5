//! Search history repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Append searched keywords and list them most recent first.
//! - Delete every row of one keyword on explicit user request.
//!
//! # Invariants
//! - Rows are immutable; there is no update path.
//! - Listing order is the reverse of insertion order (`id DESC`); the
//!   `AUTOINCREMENT` key never reuses ids, so this holds across deletes.
//! - Keyword matching on delete is exact and case-sensitive.

use super::{ensure_table_ready, RepoError, RepoResult};
use crate::model::history::{validate_keyword, HistoryEntry};
use log::debug;
use rusqlite::{params, Connection, Row};

const HISTORY_TABLE: &str = "history";

/// Repository interface for search history.
pub trait HistoryRepository {
    /// Appends one keyword and returns the id assigned by the store.
    fn insert(&self, keyword: &str) -> RepoResult<i64>;
    /// Returns every entry, most recent first.
    fn list_all(&self) -> RepoResult<Vec<HistoryEntry>>;
    /// Removes all rows equal to `keyword`; returns how many were removed.
    fn delete_by_keyword(&self, keyword: &str) -> RepoResult<usize>;
}

/// SQLite-backed history repository.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, HISTORY_TABLE, &["id", "keyword"])?;
        Ok(Self { conn })
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn insert(&self, keyword: &str) -> RepoResult<i64> {
        validate_keyword(keyword)?;

        self.conn
            .execute("INSERT INTO history (keyword) VALUES (?1);", params![keyword])?;
        let id = self.conn.last_insert_rowid();
        debug!("event=history_insert module=repo status=ok id={id}");
        Ok(id)
    }

    fn list_all(&self) -> RepoResult<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, keyword FROM history ORDER BY id DESC;")?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }

        Ok(entries)
    }

    fn delete_by_keyword(&self, keyword: &str) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM history WHERE keyword = ?1;", params![keyword])?;
        debug!("event=history_delete module=repo status=ok removed={removed}");
        Ok(removed)
    }
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let id: i64 = row.get("id")?;
    let keyword: Option<String> = row.get("keyword")?;
    let keyword = keyword.ok_or_else(|| {
        RepoError::InvalidData(format!("null keyword in history row {id}"))
    })?;

    Ok(HistoryEntry {
        id: Some(id),
        keyword,
    })
}
