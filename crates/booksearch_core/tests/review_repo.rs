use booksearch_core::db::migrations::latest_version;
use booksearch_core::db::open_db_in_memory;
use booksearch_core::{BookId, RepoError, Review, ReviewRepository, SqliteReviewRepository};
use rusqlite::Connection;

#[test]
fn get_review_for_unknown_book_is_empty_not_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReviewRepository::try_new(&conn).unwrap();
    let book_id = BookId::new(7).unwrap();

    let review = repo.get_review(book_id).unwrap();
    assert_eq!(review, Review::empty(book_id));
}

#[test]
fn save_then_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReviewRepository::try_new(&conn).unwrap();
    let book_id = BookId::new(42).unwrap();

    repo.save_review(&Review::new(book_id, "great book")).unwrap();
    assert_eq!(
        repo.get_review(book_id).unwrap().text.as_deref(),
        Some("great book")
    );

    repo.save_review(&Review::new(book_id, "")).unwrap();
    assert_eq!(repo.get_review(book_id).unwrap().text.as_deref(), Some(""));
}

#[test]
fn saving_twice_overwrites_and_keeps_one_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReviewRepository::try_new(&conn).unwrap();
    let book_id = BookId::new(3).unwrap();

    repo.save_review(&Review::new(book_id, "first take")).unwrap();
    repo.save_review(&Review::new(book_id, "second take")).unwrap();

    assert_eq!(rows_for(&conn, 3), 1);
    assert_eq!(
        repo.get_review(book_id).unwrap().text.as_deref(),
        Some("second take")
    );
}

#[test]
fn reviews_of_different_books_are_independent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReviewRepository::try_new(&conn).unwrap();
    let zero = BookId::new(0).unwrap();
    let other = BookId::new(9_000_000_001).unwrap();

    repo.save_review(&Review::new(zero, "book zero is a real book"))
        .unwrap();
    repo.save_review(&Review::new(other, "large id")).unwrap();

    assert_eq!(
        repo.get_review(zero).unwrap().text.as_deref(),
        Some("book zero is a real book")
    );
    assert_eq!(repo.get_review(other).unwrap().text.as_deref(), Some("large id"));
}

#[test]
fn saving_absent_text_clears_previous_review() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReviewRepository::try_new(&conn).unwrap();
    let book_id = BookId::new(5).unwrap();

    repo.save_review(&Review::new(book_id, "draft")).unwrap();
    repo.save_review(&Review::empty(book_id)).unwrap();

    assert_eq!(repo.get_review(book_id).unwrap().text, None);
    assert_eq!(rows_for(&conn, 5), 1);
}

#[test]
fn repository_rejects_connection_without_review_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE review (bookId INTEGER PRIMARY KEY);")
        .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteReviewRepository::try_new(&conn),
        Err(RepoError::MissingRequiredColumn {
            table: "review",
            column: "review"
        })
    ));
}

fn rows_for(conn: &Connection, book_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM review WHERE bookId = ?1;",
        [book_id],
        |row| row.get(0),
    )
    .unwrap()
}
