//! Search history record.

use super::ValidationError;
use serde::{Deserialize, Serialize};

/// One recorded search keyword.
///
/// `id` is assigned by the store on insert and is `None` beforehand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Option<i64>,
    pub keyword: String,
}

impl HistoryEntry {
    /// Creates an entry that has not been stored yet.
    pub fn new(keyword: impl Into<String>) -> Result<Self, ValidationError> {
        let entry = Self {
            id: None,
            keyword: keyword.into(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Checks the keyword invariant. The keyword itself is kept verbatim.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_keyword(&self.keyword)
    }
}

pub(crate) fn validate_keyword(keyword: &str) -> Result<(), ValidationError> {
    if keyword.trim().is_empty() {
        return Err(ValidationError::EmptyKeyword);
    }
    Ok(())
}
