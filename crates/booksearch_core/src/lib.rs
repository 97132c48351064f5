//! Core domain logic for the book search app.
//!
//! This crate owns the local store (search history and reviews), the
//! catalog client and the coordinator that sequences them for a UI host.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use catalog::{CatalogClient, CatalogError, CatalogResult, HttpCatalogClient};
pub use config::{AppConfig, CatalogConfig, ConfigError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::book::BookSummary;
pub use model::history::HistoryEntry;
pub use model::review::{BookId, Review};
pub use model::ValidationError;
pub use repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
pub use repo::review_repo::{ReviewRepository, SqliteReviewRepository};
pub use repo::{RepoError, RepoResult};
pub use service::coordinator::{
    CoordinatorError, Failure, FailureKind, ListSource, Operation, PresentationCoordinator,
    RequestId, StartupError, UiEvent,
};
pub use service::work_queue::{ShutdownPolicy, TaskHandle, WorkerClosed};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
