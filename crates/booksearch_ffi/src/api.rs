//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Build one presentation coordinator per process from host config.
//! - Forward screen actions to it and hand its events back to Dart.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - The store is opened once, by `configure`; later calls only enqueue
//!   work on the coordinator and return without touching storage or network.
//! - A missing book id is reported as a failure, never mapped to `0`.

use booksearch_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    init_logging_from_config, ping as ping_inner, AppConfig, BookId, BookSummary,
    HttpCatalogClient, ListSource, LoggingError, PresentationCoordinator, UiEvent,
};
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Mutex;

const DEFAULT_POLL_LIMIT: usize = 64;

static SESSION: OnceCell<Session> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Starts logging, opens the store and builds the coordinator.
///
/// `config_json` is the host configuration document, for example
/// `{"data_dir": "/abs/dir", "catalog": {"api_key": "..."}}`.
///
/// # FFI contract
/// - Async call: the store is opened on an FRB worker thread.
/// - Repeating the call with the same `data_dir` succeeds without reopening;
///   a different directory is refused.
/// - Returns empty string on success and error message on failure.
pub fn configure(config_json: String) -> String {
    let config = match AppConfig::from_json(&config_json) {
        Ok(config) => config,
        Err(err) => return err.to_string(),
    };

    match init_logging_from_config(&config) {
        Ok(()) => {}
        Err(LoggingError::AlreadyActive { level, dir }) => warn!(
            "event=ffi_configure module=ffi status=warn reason=logging_already_active level={} dir={}",
            level,
            dir.display()
        ),
        Err(err) => return format!("configure failed: {err}"),
    }

    let session = match SESSION.get_or_try_init(|| Session::open(&config)) {
        Ok(session) => session,
        Err(err) => return format!("configure failed: {err}"),
    };
    if session.data_dir != config.data_dir {
        return format!(
            "already configured at `{}`; refusing to switch to `{}`",
            session.data_dir.display(),
            config.data_dir.display()
        );
    }
    String::new()
}

/// One book in a result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub cover_url: String,
}

/// One history row for the history list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub id: i64,
    pub keyword: String,
}

/// Screen update produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEventItem {
    /// Replace the result list. `keyword` is `None` for best sellers.
    BookList {
        request_id: u64,
        keyword: Option<String>,
        books: Vec<BookItem>,
    },
    HistoryVisibility {
        visible: bool,
    },
    /// History, most recent first.
    History {
        items: Vec<HistoryItem>,
    },
    /// Review to pre-fill the detail view; `text` is empty when none exists.
    ReviewLoaded {
        book_id: i64,
        text: String,
        has_review: bool,
    },
    ReviewSaved {
        book_id: i64,
    },
    Failure {
        operation: String,
        kind: String,
        message: String,
    },
}

/// Outcome of enqueueing a screen action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Set for result-list requests; matches `UiEventItem::BookList`.
    pub request_id: Option<u64>,
    pub message: String,
}

impl ActionResponse {
    fn queued(request_id: Option<u64>) -> Self {
        Self {
            ok: true,
            request_id,
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            request_id: None,
            message: message.into(),
        }
    }
}

/// Requests the best-seller list.
#[flutter_rust_bridge::frb(sync)]
pub fn load_best_sellers() -> ActionResponse {
    with_session("load_best_sellers", Session::load_best_sellers)
}

/// Searches the catalog for `keyword`.
#[flutter_rust_bridge::frb(sync)]
pub fn search(keyword: String) -> ActionResponse {
    with_session("search", |session| session.search(&keyword))
}

/// Shows the history view and requests its entries.
#[flutter_rust_bridge::frb(sync)]
pub fn show_history() -> ActionResponse {
    with_session("show_history", Session::show_history)
}

/// Hides the history view.
#[flutter_rust_bridge::frb(sync)]
pub fn hide_history() -> ActionResponse {
    with_session("hide_history", Session::hide_history)
}

/// Deletes every history row equal to `keyword`, then re-lists history.
#[flutter_rust_bridge::frb(sync)]
pub fn delete_history(keyword: String) -> ActionResponse {
    with_session("delete_history", |session| session.delete_history(&keyword))
}

/// Opens the detail view of `book` and requests its saved review.
#[flutter_rust_bridge::frb(sync)]
pub fn open_book(book: BookItem) -> ActionResponse {
    with_session("open_book", |session| session.open_book(book))
}

/// Saves `text` as the only review of `book_id`.
#[flutter_rust_bridge::frb(sync)]
pub fn save_review(book_id: Option<i64>, text: String) -> ActionResponse {
    with_session("save_review", |session| session.save_review(book_id, text))
}

/// Returns up to `max_events` pending events without waiting.
///
/// `0` uses a default limit. An unconfigured process yields no events.
#[flutter_rust_bridge::frb(sync)]
pub fn poll_events(max_events: u32) -> Vec<UiEventItem> {
    let Some(session) = SESSION.get() else {
        return Vec::new();
    };
    let limit = match usize::try_from(max_events) {
        Ok(0) | Err(_) => DEFAULT_POLL_LIMIT,
        Ok(limit) => limit,
    };
    session.poll(limit).unwrap_or_else(|err| {
        warn!("event=ffi_poll module=ffi status=error error={err}");
        Vec::new()
    })
}

fn with_session(
    op: &str,
    action: impl FnOnce(&Session) -> Result<Option<u64>, String>,
) -> ActionResponse {
    let Some(session) = SESSION.get() else {
        return ActionResponse::failure(format!(
            "{op} failed: not configured; call configure first"
        ));
    };
    match action(session) {
        Ok(request_id) => ActionResponse::queued(request_id),
        Err(err) => {
            warn!("event=ffi_action module=ffi status=error op={op} error={err}");
            ActionResponse::failure(format!("{op} failed: {err}"))
        }
    }
}

/// Coordinator plus the foreground end of its event channel.
struct Session {
    data_dir: PathBuf,
    coordinator: Mutex<PresentationCoordinator<HttpCatalogClient>>,
    events: Mutex<Receiver<UiEvent>>,
}

impl Session {
    fn open(config: &AppConfig) -> Result<Self, String> {
        let (coordinator, events) =
            PresentationCoordinator::from_config(config).map_err(|err| err.to_string())?;
        info!("event=ffi_configure module=ffi status=ok");
        Ok(Self {
            data_dir: config.data_dir.clone(),
            coordinator: Mutex::new(coordinator),
            events: Mutex::new(events),
        })
    }

    fn with_coordinator<T>(
        &self,
        f: impl FnOnce(&mut PresentationCoordinator<HttpCatalogClient>) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut coordinator = self
            .coordinator
            .lock()
            .map_err(|_| "coordinator lock poisoned".to_string())?;
        f(&mut coordinator)
    }

    fn load_best_sellers(&self) -> Result<Option<u64>, String> {
        self.with_coordinator(|coordinator| {
            coordinator
                .load_best_sellers()
                .map(|request| Some(request.get()))
                .map_err(|err| err.to_string())
        })
    }

    fn search(&self, keyword: &str) -> Result<Option<u64>, String> {
        self.with_coordinator(|coordinator| {
            coordinator
                .search(keyword)
                .map(|request| Some(request.get()))
                .map_err(|err| err.to_string())
        })
    }

    fn show_history(&self) -> Result<Option<u64>, String> {
        self.with_coordinator(|coordinator| {
            coordinator
                .show_history()
                .map(|_| None)
                .map_err(|err| err.to_string())
        })
    }

    fn hide_history(&self) -> Result<Option<u64>, String> {
        self.with_coordinator(|coordinator| {
            coordinator.hide_history();
            Ok(None)
        })
    }

    fn delete_history(&self, keyword: &str) -> Result<Option<u64>, String> {
        self.with_coordinator(|coordinator| {
            coordinator
                .delete_history(keyword)
                .map(|_| None)
                .map_err(|err| err.to_string())
        })
    }

    fn open_book(&self, book: BookItem) -> Result<Option<u64>, String> {
        let summary = BookSummary {
            id: book.id,
            title: book.title,
            description: book.description,
            cover_url: book.cover_url,
        };
        self.with_coordinator(|coordinator| {
            coordinator
                .open_book(&summary)
                .map(|_| None)
                .map_err(|err| err.to_string())
        })
    }

    fn save_review(&self, book_id: Option<i64>, text: String) -> Result<Option<u64>, String> {
        let book_id = BookId::from_optional(book_id).map_err(|err| err.to_string())?;
        self.with_coordinator(|coordinator| {
            coordinator
                .save_review(book_id, text)
                .map(|_| None)
                .map_err(|err| err.to_string())
        })
    }

    fn poll(&self, limit: usize) -> Result<Vec<UiEventItem>, String> {
        let events = self
            .events
            .lock()
            .map_err(|_| "event queue lock poisoned".to_string())?;
        let mut polled = Vec::new();
        while polled.len() < limit {
            match events.try_recv() {
                Ok(event) => polled.push(to_item(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err("coordinator event channel closed".to_string())
                }
            }
        }
        Ok(polled)
    }
}

fn to_item(event: UiEvent) -> UiEventItem {
    match event {
        UiEvent::BookList {
            request,
            source,
            books,
        } => UiEventItem::BookList {
            request_id: request.get(),
            keyword: match source {
                ListSource::BestSellers => None,
                ListSource::Search(keyword) => Some(keyword),
            },
            books: books
                .into_iter()
                .map(|book| BookItem {
                    id: book.id,
                    title: book.title,
                    description: book.description,
                    cover_url: book.cover_url,
                })
                .collect(),
        },
        UiEvent::HistoryVisibility(visible) => UiEventItem::HistoryVisibility { visible },
        UiEvent::History(entries) => UiEventItem::History {
            items: entries
                .into_iter()
                .filter_map(|entry| {
                    entry.id.map(|id| HistoryItem {
                        id,
                        keyword: entry.keyword,
                    })
                })
                .collect(),
        },
        UiEvent::ReviewLoaded(review) => UiEventItem::ReviewLoaded {
            book_id: review.book_id.get(),
            text: review.text_or_empty().to_string(),
            has_review: review.text.is_some(),
        },
        UiEvent::ReviewSaved(book_id) => UiEventItem::ReviewSaved {
            book_id: book_id.get(),
        },
        UiEvent::Failure(failure) => UiEventItem::Failure {
            operation: failure.operation.as_str().to_string(),
            kind: failure.kind.as_str().to_string(),
            message: failure.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        configure, core_version, init_logging, ping, poll_events, show_history, BookItem,
        Session, UiEventItem,
    };
    use booksearch_core::{AppConfig, CatalogConfig};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::sync::OnceLock;
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    static CONFIGURED_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();
    const BOOKS_BODY: &str = r#"{"title":"result","item":[
        {"itemId":11,"title":"Programming Rust","description":"systems","coverSmallUrl":"http://img/11"}
    ]}"#;

    fn session_config(data_dir: &Path, base_url: &str) -> AppConfig {
        let mut catalog = CatalogConfig::with_api_key("test-key");
        catalog.base_url = base_url.to_string();
        catalog.request_timeout_ms = 5_000;
        AppConfig {
            data_dir: data_dir.to_path_buf(),
            log_level: None,
            catalog,
        }
    }

    /// Answers `count` catalog requests with one book and returns their request lines.
    fn serve_catalog(count: usize) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let mut lines = Vec::new();
            for _ in 0..count {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut chunk = [0_u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    let read = stream.read(&mut chunk).unwrap();
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..read]);
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{BOOKS_BODY}",
                    BOOKS_BODY.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
                lines.push(
                    String::from_utf8_lossy(&request)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                );
            }
            lines
        });
        (base_url, server)
    }

    fn wait_for(session: &Session, wanted: impl Fn(&UiEventItem) -> bool) -> UiEventItem {
        let deadline = Instant::now() + WAIT;
        loop {
            for event in session.poll(16).unwrap() {
                if wanted(&event) {
                    return event;
                }
            }
            assert!(Instant::now() < deadline, "expected event was not published");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn history_keywords(session: &Session) -> Vec<String> {
        match wait_for(session, |event| matches!(event, UiEventItem::History { .. })) {
            UiEventItem::History { items } => items.into_iter().map(|item| item.keyword).collect(),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn search_publishes_books_and_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let (base_url, server) = serve_catalog(2);
        let session = Session::open(&session_config(dir.path(), &base_url)).unwrap();

        let best = session.load_best_sellers().unwrap().unwrap();
        match wait_for(&session, |event| matches!(event, UiEventItem::BookList { .. })) {
            UiEventItem::BookList {
                request_id,
                keyword,
                ..
            } => {
                assert_eq!(request_id, best);
                assert_eq!(keyword, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let request = session.search("rust").unwrap().unwrap();
        assert!(request > best);
        match wait_for(&session, |event| matches!(event, UiEventItem::BookList { .. })) {
            UiEventItem::BookList {
                request_id,
                keyword,
                books,
            } => {
                assert_eq!(request_id, request);
                assert_eq!(keyword.as_deref(), Some("rust"));
                assert_eq!(books.len(), 1);
                assert_eq!(books[0].id, 11);
                assert_eq!(books[0].cover_url, "http://img/11");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let lines = server.join().unwrap();
        assert!(lines[0].starts_with("GET /api/bestSeller.api?"), "{}", lines[0]);
        assert!(lines[1].contains("query=rust"), "{}", lines[1]);

        session.show_history().unwrap();
        assert_eq!(history_keywords(&session), vec!["rust"]);

        session.delete_history("rust").unwrap();
        assert!(history_keywords(&session).is_empty());
    }

    #[test]
    fn blank_search_is_refused_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&session_config(dir.path(), "http://127.0.0.1:9")).unwrap();

        let err = session.search("   ").unwrap_err();
        assert!(err.contains("empty"), "{err}");
    }

    #[test]
    fn review_is_saved_then_loaded_when_book_opens() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&session_config(dir.path(), "http://127.0.0.1:9")).unwrap();
        let book = BookItem {
            id: 42,
            title: "Dune".to_string(),
            description: String::new(),
            cover_url: String::new(),
        };

        session.open_book(book.clone()).unwrap();
        assert_eq!(
            wait_for(&session, |event| matches!(event, UiEventItem::ReviewLoaded { .. })),
            UiEventItem::ReviewLoaded {
                book_id: 42,
                text: String::new(),
                has_review: false,
            }
        );

        session.save_review(Some(42), "great book".to_string()).unwrap();
        assert_eq!(
            wait_for(&session, |event| matches!(event, UiEventItem::ReviewSaved { .. })),
            UiEventItem::ReviewSaved { book_id: 42 }
        );

        session.open_book(book).unwrap();
        assert_eq!(
            wait_for(&session, |event| matches!(event, UiEventItem::ReviewLoaded { .. })),
            UiEventItem::ReviewLoaded {
                book_id: 42,
                text: "great book".to_string(),
                has_review: true,
            }
        );
    }

    #[test]
    fn review_calls_require_a_valid_book_id() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&session_config(dir.path(), "http://127.0.0.1:9")).unwrap();

        let missing = session.save_review(None, "orphan".to_string()).unwrap_err();
        assert!(missing.contains("book id is required"), "{missing}");

        let negative = session
            .open_book(BookItem {
                id: -3,
                title: String::new(),
                description: String::new(),
                cover_url: String::new(),
            })
            .unwrap_err();
        assert!(negative.contains("non-negative"), "{negative}");
    }

    #[test]
    fn configure_opens_one_session_per_process() {
        assert!(!configure("{".to_string()).is_empty());

        let dir = CONFIGURED_DIR.get_or_init(|| tempfile::tempdir().unwrap());
        let other = tempfile::tempdir().unwrap();
        let config_for = |path: &Path| {
            format!(
                r#"{{"data_dir":{},"log_level":"info","catalog":{{"api_key":"k","base_url":"http://127.0.0.1:9"}}}}"#,
                serde_json::to_string(path.to_str().unwrap()).unwrap()
            )
        };

        let error = configure(config_for(dir.path()));
        assert!(error.is_empty(), "{error}");
        assert!(dir.path().join("logs").is_dir());
        let error = configure(config_for(dir.path()));
        assert!(error.is_empty(), "{error}");

        let error = configure(config_for(other.path()));
        assert!(error.contains("refusing to switch"), "{error}");

        assert!(show_history().ok);
        let deadline = Instant::now() + WAIT;
        let mut events = Vec::new();
        while !events
            .iter()
            .any(|event| matches!(event, UiEventItem::History { .. }))
        {
            assert!(Instant::now() < deadline, "history was not published");
            events.extend(poll_events(0));
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            events[0],
            UiEventItem::HistoryVisibility { visible: true }
        );
    }
}
