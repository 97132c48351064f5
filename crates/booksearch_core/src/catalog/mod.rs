//! Remote book catalog access.
//!
//! # Responsibility
//! - Define the `CatalogClient` contract used by the coordinator.
//! - Map catalog payloads into ordered `BookSummary` lists.
//!
//! # Invariants
//! - Requests are single-shot; nothing here retries.
//! - A failed request yields an error and never a partial list.
//! - Server order of books is preserved.

use crate::model::book::BookSummary;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dto;
pub mod http;

pub use http::HttpCatalogClient;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur when talking to the catalog service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Transport failure: connect, timeout, or body read.
    Network(String),
    /// The service answered with a non-success status.
    Response { status: u16 },
    /// The payload could not be decoded into a book list.
    Decode(String),
    /// The client could not be built from its configuration.
    Config(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "catalog request failed: {message}"),
            Self::Response { status } => write!(f, "catalog responded with status {status}"),
            Self::Decode(message) => write!(f, "failed to decode catalog payload: {message}"),
            Self::Config(message) => {
                write!(f, "invalid catalog client configuration: {message}")
            }
        }
    }
}

impl Error for CatalogError {}

/// Read-only access to the remote catalog.
pub trait CatalogClient: Send + 'static {
    /// Fetches the best-seller listing.
    fn best_sellers(&self) -> CatalogResult<Vec<BookSummary>>;
    /// Searches books by keyword.
    fn search(&self, keyword: &str) -> CatalogResult<Vec<BookSummary>>;
}

#[cfg(test)]
mod tests {
    use super::CatalogError;
    use crate::model::ValidationError;
    use crate::service::coordinator::CoordinatorError;
    use std::error::Error;

    #[test]
    fn catalog_errors_render_their_cause() {
        assert_eq!(
            CatalogError::Response { status: 503 }.to_string(),
            "catalog responded with status 503"
        );
        assert_eq!(
            CatalogError::Network("timed out".to_string()).to_string(),
            "catalog request failed: timed out"
        );
    }

    #[test]
    fn coordinator_error_exposes_validation_source() {
        let err = CoordinatorError::from(ValidationError::EmptyKeyword);
        assert_eq!(err.to_string(), "history keyword cannot be empty");
        assert!(err.source().is_some());
    }
}
