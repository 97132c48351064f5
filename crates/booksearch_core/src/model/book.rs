//! Catalog book projection shown in result lists and handed to detail views.

use serde::{Deserialize, Serialize};

/// Read-only summary of a catalog book. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub cover_url: String,
}
