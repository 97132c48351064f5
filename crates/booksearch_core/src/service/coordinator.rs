//! Presentation coordinator for the book search screens.
//!
//! # Responsibility
//! - Sequence catalog fetches, repository writes and list refreshes.
//! - Deliver every result to the foreground as a `UiEvent`.
//!
//! # Invariants
//! - Owns no persistent state; storage is reached only through repositories
//!   running on the storage worker.
//! - Foreground calls never block on storage or network work.
//! - A result-list response older than the latest issued list request is
//!   dropped, so a slow response cannot overwrite a newer one.
//! - Delete-then-refresh runs as one storage task.
//! - Failures are published once and never retried.
//! - Dropping the coordinator never waits on the network: queued catalog
//!   requests are skipped and an in-flight one is left to finish unobserved.
//!   Storage work queued before the drop still runs to completion.

use crate::catalog::{CatalogClient, CatalogError, HttpCatalogClient};
use crate::config::AppConfig;
use crate::db::{open_db_in_dir, DbError};
use crate::model::book::BookSummary;
use crate::model::history::{validate_keyword, HistoryEntry};
use crate::model::review::{BookId, Review};
use crate::model::ValidationError;
use crate::repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
use crate::repo::review_repo::{ReviewRepository, SqliteReviewRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::work_queue::{
    SerialWorker, ShutdownPolicy, TaskHandle, WorkerClosed, WorkerHandle,
};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Identity of one result-list request. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Which request filled the result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    BestSellers,
    Search(String),
}

/// Use-case that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BestSellers,
    Search,
    RecordHistory,
    ListHistory,
    DeleteHistory,
    LoadReview,
    SaveReview,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BestSellers => "best_sellers",
            Self::Search => "search",
            Self::RecordHistory => "record_history",
            Self::ListHistory => "list_history",
            Self::DeleteHistory => "delete_history",
            Self::LoadReview => "load_review",
            Self::SaveReview => "save_review",
        }
    }
}

/// Failure category, mirroring the storage/network/response split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Storage,
    Network,
    Response,
    Decode,
    InvalidInput,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Response => "response",
            Self::Decode => "decode",
            Self::InvalidInput => "invalid_input",
        }
    }
}

/// User-visible failure record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub operation: Operation,
    pub kind: FailureKind,
    pub message: String,
}

/// Result delivered to the foreground flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Replace the visible result list.
    BookList {
        request: RequestId,
        source: ListSource,
        books: Vec<BookSummary>,
    },
    /// History view shown (`true`) or hidden (`false`).
    HistoryVisibility(bool),
    /// History entries, most recent first.
    History(Vec<HistoryEntry>),
    /// Review to pre-fill the detail edit surface with.
    ReviewLoaded(Review),
    /// Review for this book was stored.
    ReviewSaved(BookId),
    Failure(Failure),
}

/// Error returned synchronously by coordinator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    Validation(ValidationError),
    WorkerClosed(WorkerClosed),
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::WorkerClosed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::WorkerClosed(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CoordinatorError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<WorkerClosed> for CoordinatorError {
    fn from(value: WorkerClosed) -> Self {
        Self::WorkerClosed(value)
    }
}

/// Coordinator could not be assembled from host configuration.
#[derive(Debug)]
pub enum StartupError {
    Store(DbError),
    Catalog(CatalogError),
    Worker(std::io::Error),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store open failed: {err}"),
            Self::Catalog(err) => write!(f, "catalog client setup failed: {err}"),
            Self::Worker(err) => write!(f, "worker thread spawn failed: {err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Catalog(err) => Some(err),
            Self::Worker(err) => Some(err),
        }
    }
}

/// Publishing side of the foreground event channel.
///
/// A dropped receiver means the view was torn down; events are then
/// discarded instead of reaching a dead view.
#[derive(Clone)]
struct EventSink {
    sender: Sender<UiEvent>,
}

impl EventSink {
    fn publish(&self, event: UiEvent) {
        if self.sender.send(event).is_err() {
            debug!("event=ui_publish module=coordinator status=dropped reason=view_gone");
        }
    }

    fn fail(&self, operation: Operation, kind: FailureKind, message: impl Into<String>) {
        self.publish(UiEvent::Failure(Failure {
            operation,
            kind,
            message: message.into(),
        }));
    }

    fn fail_repo(&self, operation: Operation, err: &RepoError) {
        error!(
            "event=storage_op module=coordinator status=error op={} error={}",
            operation.as_str(),
            err
        );
        let kind = if err.is_storage() {
            FailureKind::Storage
        } else {
            FailureKind::InvalidInput
        };
        self.fail(operation, kind, err.to_string());
    }
}

/// Issues `RequestId`s and remembers the newest one.
#[derive(Default)]
struct RequestFence {
    latest: AtomicU64,
}

impl RequestFence {
    fn next(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn is_current(&self, request: RequestId) -> bool {
        self.latest.load(Ordering::Acquire) == request.0
    }
}

/// Orchestrates the catalog client and repositories for a UI host.
///
/// The network worker abandons its queue on drop; the storage worker
/// drains it.
pub struct PresentationCoordinator<C: CatalogClient> {
    network: SerialWorker<C>,
    storage: SerialWorker<Connection>,
    events: EventSink,
    fence: Arc<RequestFence>,
    history_visible: Arc<AtomicBool>,
    pending_list: Option<TaskHandle>,
}

impl<C: CatalogClient> PresentationCoordinator<C> {
    /// Builds a coordinator over an already opened store.
    ///
    /// The returned receiver is the foreground's end of the event channel.
    pub fn new(conn: Connection, catalog: C) -> std::io::Result<(Self, Receiver<UiEvent>)> {
        let (sender, receiver) = mpsc::channel();
        let storage = SerialWorker::spawn_with("storage", conn, ShutdownPolicy::Drain)?;
        let network = SerialWorker::spawn_with("network", catalog, ShutdownPolicy::Abandon)?;
        info!("event=coordinator_start module=coordinator status=ok");

        Ok((
            Self {
                network,
                storage,
                events: EventSink { sender },
                fence: Arc::new(RequestFence::default()),
                history_visible: Arc::new(AtomicBool::new(false)),
                pending_list: None,
            },
            receiver,
        ))
    }

    /// Whether the history view is currently shown.
    pub fn is_history_visible(&self) -> bool {
        self.history_visible.load(Ordering::Acquire)
    }

    /// Loads the initial best-seller list.
    pub fn load_best_sellers(&mut self) -> Result<RequestId, CoordinatorError> {
        let request = self.fence.next();
        let events = self.events.clone();
        let fence = Arc::clone(&self.fence);

        let handle = self.network.submit(move |catalog: &mut C| {
            let result = catalog.best_sellers();
            if !fence.is_current(request) {
                debug!(
                    "event=book_list module=coordinator status=stale op=best_sellers request_id={}",
                    request.0
                );
                return;
            }
            match result {
                Ok(books) => events.publish(UiEvent::BookList {
                    request,
                    source: ListSource::BestSellers,
                    books,
                }),
                Err(err) => publish_catalog_failure(&events, Operation::BestSellers, &err),
            }
        })?;
        self.replace_pending_list(handle);
        Ok(request)
    }

    /// Searches the catalog; on success records `keyword` in history.
    ///
    /// The previous list request is cancelled if it has not started.
    pub fn search(&mut self, keyword: &str) -> Result<RequestId, CoordinatorError> {
        if let Err(err) = validate_keyword(keyword) {
            warn!("event=search module=coordinator status=rejected error={err}");
            return Err(err.into());
        }

        let request = self.fence.next();
        let keyword = keyword.to_string();
        let events = self.events.clone();
        let fence = Arc::clone(&self.fence);
        let history_visible = Arc::clone(&self.history_visible);
        let storage = self.storage.handle()?;

        let handle = self.network.submit(move |catalog: &mut C| {
            let result = catalog.search(&keyword);
            let books = match result {
                Ok(books) => books,
                Err(err) => {
                    if fence.is_current(request) {
                        set_history_visible(&history_visible, &events, false);
                        publish_catalog_failure(&events, Operation::Search, &err);
                    } else {
                        debug!(
                            "event=search module=coordinator status=stale_failure request_id={} error={}",
                            request.0, err
                        );
                    }
                    return;
                }
            };

            // Recorded before the list is published so a history read issued
            // after the list arrives already sees this keyword.
            record_keyword(&storage, &events, keyword.clone());

            if !fence.is_current(request) {
                debug!(
                    "event=book_list module=coordinator status=stale op=search request_id={}",
                    request.0
                );
                return;
            }
            set_history_visible(&history_visible, &events, false);
            events.publish(UiEvent::BookList {
                request,
                source: ListSource::Search(keyword),
                books,
            });
        })?;
        self.replace_pending_list(handle);
        Ok(request)
    }

    /// Shows the history view now and fills it once the listing completes.
    pub fn show_history(&self) -> Result<TaskHandle, CoordinatorError> {
        set_history_visible(&self.history_visible, &self.events, true);
        self.refresh_history()
    }

    /// Hides the history view.
    pub fn hide_history(&self) {
        set_history_visible(&self.history_visible, &self.events, false);
    }

    /// Re-reads history and publishes it.
    pub fn refresh_history(&self) -> Result<TaskHandle, CoordinatorError> {
        let events = self.events.clone();
        let handle = self.storage.submit(move |conn: &mut Connection| {
            publish_history(conn, &events, Operation::ListHistory);
        })?;
        Ok(handle)
    }

    /// Deletes every entry of `keyword`, then publishes the refreshed list.
    pub fn delete_history(&self, keyword: &str) -> Result<TaskHandle, CoordinatorError> {
        let keyword = keyword.to_string();
        let events = self.events.clone();
        let handle = self.storage.submit(move |conn: &mut Connection| {
            let deleted = SqliteHistoryRepository::try_new(conn)
                .and_then(|repo| repo.delete_by_keyword(&keyword));
            match deleted {
                Ok(removed) => {
                    info!("event=history_delete module=coordinator status=ok removed={removed}");
                    publish_history(conn, &events, Operation::ListHistory);
                }
                Err(err) => events.fail_repo(Operation::DeleteHistory, &err),
            }
        })?;
        Ok(handle)
    }

    /// Loads the saved review for `book` to pre-fill its detail view.
    pub fn open_book(&self, book: &BookSummary) -> Result<TaskHandle, CoordinatorError> {
        let book_id = BookId::new(book.id)?;
        let events = self.events.clone();
        let handle = self.storage.submit(move |conn: &mut Connection| {
            let loaded = SqliteReviewRepository::try_new(conn)
                .and_then(|repo| repo.get_review(book_id));
            match loaded {
                Ok(review) => events.publish(UiEvent::ReviewLoaded(review)),
                Err(err) => events.fail_repo(Operation::LoadReview, &err),
            }
        })?;
        Ok(handle)
    }

    /// Stores `text` as the review of `book_id`, replacing any previous one.
    pub fn save_review(
        &self,
        book_id: BookId,
        text: impl Into<String>,
    ) -> Result<TaskHandle, CoordinatorError> {
        let review = Review::new(book_id, text);
        let events = self.events.clone();
        let handle = self.storage.submit(move |conn: &mut Connection| {
            let saved = SqliteReviewRepository::try_new(conn)
                .and_then(|repo| repo.save_review(&review));
            match saved {
                Ok(()) => {
                    info!(
                        "event=review_save module=coordinator status=ok book_id={}",
                        review.book_id
                    );
                    events.publish(UiEvent::ReviewSaved(review.book_id));
                }
                Err(err) => events.fail_repo(Operation::SaveReview, &err),
            }
        })?;
        Ok(handle)
    }

    fn replace_pending_list(&mut self, handle: TaskHandle) {
        if let Some(previous) = self.pending_list.replace(handle) {
            previous.cancel();
        }
    }
}

impl PresentationCoordinator<HttpCatalogClient> {
    /// Opens the store under `config.data_dir` and the HTTP catalog client,
    /// then starts the coordinator over them.
    pub fn from_config(config: &AppConfig) -> Result<(Self, Receiver<UiEvent>), StartupError> {
        let catalog =
            HttpCatalogClient::new(config.catalog.clone()).map_err(StartupError::Catalog)?;
        let conn = open_db_in_dir(&config.data_dir).map_err(StartupError::Store)?;
        Self::new(conn, catalog).map_err(StartupError::Worker)
    }
}

impl<C: CatalogClient> Drop for PresentationCoordinator<C> {
    fn drop(&mut self) {
        // Retire every issued request so an in-flight response is not published.
        self.fence.next();
        if let Some(pending) = self.pending_list.take() {
            pending.cancel();
        }
        info!("event=coordinator_stop module=coordinator status=ok");
    }
}

fn set_history_visible(flag: &AtomicBool, events: &EventSink, visible: bool) {
    flag.store(visible, Ordering::Release);
    events.publish(UiEvent::HistoryVisibility(visible));
}

fn record_keyword(storage: &WorkerHandle<Connection>, events: &EventSink, keyword: String) {
    let events = events.clone();
    let submitted = storage.submit(move |conn: &mut Connection| {
        let inserted: RepoResult<i64> =
            SqliteHistoryRepository::try_new(conn).and_then(|repo| repo.insert(&keyword));
        if let Err(err) = inserted {
            events.fail_repo(Operation::RecordHistory, &err);
        }
    });
    if let Err(err) = submitted {
        error!("event=history_insert module=coordinator status=error error={err}");
    }
}

fn publish_history(conn: &Connection, events: &EventSink, operation: Operation) {
    let listed = SqliteHistoryRepository::try_new(conn).and_then(|repo| repo.list_all());
    match listed {
        Ok(entries) => events.publish(UiEvent::History(entries)),
        Err(err) => events.fail_repo(operation, &err),
    }
}

fn publish_catalog_failure(events: &EventSink, operation: Operation, err: &CatalogError) {
    error!(
        "event=catalog_op module=coordinator status=error op={} error={}",
        operation.as_str(),
        err
    );
    let kind = match err {
        CatalogError::Network(_) | CatalogError::Config(_) => FailureKind::Network,
        CatalogError::Response { .. } => FailureKind::Response,
        CatalogError::Decode(_) => FailureKind::Decode,
    };
    events.fail(operation, kind, err.to_string());
}
