//! Wire payloads returned by the catalog service.
//!
//! Best-seller and search endpoints share one envelope shape:
//! `{"title": "...", "item": [{"itemId": 1, "title": "...", ...}]}`.

use super::{CatalogError, CatalogResult};
use crate::model::book::BookSummary;
use serde::Deserialize;

/// Response envelope for both best-seller and search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct BookListDto {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "item", default)]
    pub books: Vec<BookDto>,
}

/// One book record as sent by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct BookDto {
    #[serde(rename = "itemId")]
    pub item_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "coverSmallUrl", default)]
    pub cover_small_url: Option<String>,
}

impl From<BookDto> for BookSummary {
    fn from(value: BookDto) -> Self {
        Self {
            id: value.item_id,
            title: value.title,
            description: value.description.unwrap_or_default(),
            cover_url: value.cover_small_url.unwrap_or_default(),
        }
    }
}

/// Decodes a response body into books, keeping server order.
pub fn parse_book_list(body: &str) -> CatalogResult<Vec<BookSummary>> {
    let payload: BookListDto =
        serde_json::from_str(body).map_err(|err| CatalogError::Decode(err.to_string()))?;
    Ok(payload.books.into_iter().map(BookSummary::from).collect())
}
