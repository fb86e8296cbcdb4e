// zlibrary-core
// Copyright (C) 2026 zlibrary-core contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Catalog Repositories (C6, §4.6).
//!
//! Flat, parameterized-query functions generic over any sqlx executor, so
//! the same function works against a bare pool or a transaction handle. No
//! query in this module ever interpolates a caller-supplied string into SQL
//! text (testable property 8); every value travels through a bind parameter.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{CoreError, Result};

use super::models::{Author, Book, Download, DownloadStatus, ListBook, NewBook, ReadingList, SavedBook, SearchQuery};

// ---- books ----------------------------------------------------------------

/// Upserts in one round trip via `RETURNING`, since the executor type may be
/// a transaction handle that sqlx consumes by value and cannot be reused
/// for a follow-up `SELECT`.
pub async fn upsert_book<'e, E>(executor: E, book: &NewBook) -> Result<Book>
where
    E: Executor<'e, Database = Sqlite>,
{
    if book.title.trim().is_empty() {
        return Err(CoreError::catalog(format!(
            "book '{}' has an empty title",
            book.id
        )));
    }

    let now = Utc::now();
    let result = sqlx::query_as::<_, Book>(
        r#"
        INSERT INTO books (
            id, hash, title, year, publisher, language, extension,
            filesize_human, filesize_bytes, cover_url, description, isbn,
            edition, pages, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            hash = excluded.hash,
            title = excluded.title,
            year = excluded.year,
            publisher = excluded.publisher,
            language = excluded.language,
            extension = excluded.extension,
            filesize_human = excluded.filesize_human,
            filesize_bytes = excluded.filesize_bytes,
            cover_url = excluded.cover_url,
            description = excluded.description,
            isbn = excluded.isbn,
            edition = excluded.edition,
            pages = excluded.pages,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(&book.id)
    .bind(&book.hash)
    .bind(&book.title)
    .bind(&book.year)
    .bind(&book.publisher)
    .bind(&book.language)
    .bind(&book.extension)
    .bind(&book.filesize_human)
    .bind(book.filesize_bytes)
    .bind(&book.cover_url)
    .bind(&book.description)
    .bind(&book.isbn)
    .bind(&book.edition)
    .bind(book.pages)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(result)
}

pub async fn get_book<'e, E>(executor: E, id: &str) -> Result<Option<Book>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(book)
}

pub async fn delete_book<'e, E>(executor: E, id: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM books WHERE id = ?").bind(id).execute(executor).await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::not_found(format!("book '{id}'")));
    }
    Ok(())
}

pub async fn count_books(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books").fetch_one(pool).await?;
    Ok(count)
}

/// Counts the rows `search_books` would return for the same filter, without
/// paging (§4.6: book repo `count(filters)`, used for paged-browse totals).
pub async fn count_filtered_books(pool: &SqlitePool, filter: &BookFilter) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM books
        WHERE (?1 IS NULL OR title LIKE '%' || ?1 || '%')
          AND (?2 IS NULL OR language = ?2)
          AND (?3 IS NULL OR year >= ?3)
          AND (?4 IS NULL OR year <= ?4)
          AND (?5 IS NULL OR extension = ?5)
          AND (?6 IS NULL OR EXISTS (
              SELECT 1 FROM book_authors ba
              JOIN authors a ON a.id = ba.author_id
              WHERE ba.book_id = books.id AND a.name LIKE '%' || ?6 || '%'
          ))
        "#,
    )
    .bind(&filter.title_contains)
    .bind(&filter.language)
    .bind(&filter.year_min)
    .bind(&filter.year_max)
    .bind(&filter.extension)
    .bind(&filter.author_contains)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn count_distinct_languages(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT language) FROM books WHERE language IS NOT NULL")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_distinct_formats(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT extension) FROM books WHERE extension IS NOT NULL")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_downloads(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads").fetch_one(pool).await?;
    Ok(count)
}

#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title_contains: Option<String>,
    pub language: Option<String>,
    pub year_min: Option<String>,
    pub year_max: Option<String>,
    pub extension: Option<String>,
    /// Substring match on author name, via a join against `book_authors`.
    pub author_contains: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Filtered browse query (§4.2, §4.6): a single statement, no per-row N+1.
/// Ordered by title ascending with a stable tie-break on external id, so
/// pagination over `limit`/`offset` is deterministic.
pub async fn search_books(pool: &SqlitePool, filter: &BookFilter) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT * FROM books
        WHERE (?1 IS NULL OR title LIKE '%' || ?1 || '%')
          AND (?2 IS NULL OR language = ?2)
          AND (?3 IS NULL OR year >= ?3)
          AND (?4 IS NULL OR year <= ?4)
          AND (?5 IS NULL OR extension = ?5)
          AND (?6 IS NULL OR EXISTS (
              SELECT 1 FROM book_authors ba
              JOIN authors a ON a.id = ba.author_id
              WHERE ba.book_id = books.id AND a.name LIKE '%' || ?6 || '%'
          ))
        ORDER BY title ASC, id ASC
        LIMIT ?7 OFFSET ?8
        "#,
    )
    .bind(&filter.title_contains)
    .bind(&filter.language)
    .bind(&filter.year_min)
    .bind(&filter.year_max)
    .bind(&filter.extension)
    .bind(&filter.author_contains)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;
    Ok(books)
}

pub async fn authors_for_book<'e, E>(executor: E, book_id: &str) -> Result<Vec<Author>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let authors = sqlx::query_as::<_, Author>(
        r#"
        SELECT a.* FROM authors a
        JOIN book_authors ba ON ba.author_id = a.id
        WHERE ba.book_id = ?
        ORDER BY ba.position
        "#,
    )
    .bind(book_id)
    .fetch_all(executor)
    .await?;
    Ok(authors)
}

// ---- authors ----------------------------------------------------------------

pub async fn get_or_create_author<'e, E>(executor: E, name: &str) -> Result<Author>
where
    E: Executor<'e, Database = Sqlite>,
{
    let author = sqlx::query_as::<_, Author>(
        "INSERT INTO authors (name) VALUES (?) ON CONFLICT(name) DO UPDATE SET name = excluded.name RETURNING *",
    )
    .bind(name)
    .fetch_one(executor)
    .await?;
    Ok(author)
}

pub async fn link_book_author<'e, E>(executor: E, book_id: &str, author_id: i64, position: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO book_authors (book_id, author_id, position) VALUES (?, ?, ?)",
    )
    .bind(book_id)
    .bind(author_id)
    .bind(position)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn unlink_authors_for_book<'e, E>(executor: E, book_id: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM book_authors WHERE book_id = ?").bind(book_id).execute(executor).await?;
    Ok(())
}

// ---- reading lists ----------------------------------------------------------

pub async fn create_list(pool: &SqlitePool, name: &str, description: Option<&str>) -> Result<ReadingList> {
    let now = Utc::now();
    sqlx::query("INSERT INTO reading_lists (name, description, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;
    get_list_by_name(pool, name)
        .await?
        .ok_or_else(|| CoreError::catalog("list vanished after insert"))
}

pub async fn get_list_by_name(pool: &SqlitePool, name: &str) -> Result<Option<ReadingList>> {
    let list = sqlx::query_as::<_, ReadingList>("SELECT * FROM reading_lists WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(list)
}

pub async fn list_all_lists(pool: &SqlitePool) -> Result<Vec<ReadingList>> {
    let lists = sqlx::query_as::<_, ReadingList>("SELECT * FROM reading_lists ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(lists)
}

pub async fn delete_list(pool: &SqlitePool, list_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM reading_lists WHERE id = ?").bind(list_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::not_found(format!("list id {list_id}")));
    }
    Ok(())
}

pub async fn add_book_to_list(pool: &SqlitePool, list_id: i64, book_id: &str, position: i64) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO list_books (list_id, book_id, position, added_at) VALUES (?, ?, ?, ?)",
    )
    .bind(list_id)
    .bind(book_id)
    .bind(position)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_book_from_list(pool: &SqlitePool, list_id: i64, book_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM list_books WHERE list_id = ? AND book_id = ?")
        .bind(list_id)
        .bind(book_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::not_found(format!("book '{book_id}' in list {list_id}")));
    }
    Ok(())
}

pub async fn books_in_list(pool: &SqlitePool, list_id: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT b.* FROM books b
        JOIN list_books lb ON lb.book_id = b.id
        WHERE lb.list_id = ?
        ORDER BY lb.position
        "#,
    )
    .bind(list_id)
    .fetch_all(pool)
    .await?;
    Ok(books)
}

pub async fn list_books_entries(pool: &SqlitePool, list_id: i64) -> Result<Vec<ListBook>> {
    let entries = sqlx::query_as::<_, ListBook>("SELECT * FROM list_books WHERE list_id = ? ORDER BY position")
        .bind(list_id)
        .fetch_all(pool)
        .await?;
    Ok(entries)
}

// ---- saved books --------------------------------------------------------

pub async fn save_book(pool: &SqlitePool, book_id: &str, notes: Option<&str>, tags: Option<&str>, priority: i64) -> Result<SavedBook> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO saved_books (book_id, notes, tags, priority, saved_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(book_id)
    .bind(notes)
    .bind(tags)
    .bind(priority)
    .bind(now)
    .execute(pool)
    .await?;
    sqlx::query_as::<_, SavedBook>("SELECT * FROM saved_books WHERE book_id = ?")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .map_err(CoreError::from)
}

pub async fn unsave_book(pool: &SqlitePool, book_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM saved_books WHERE book_id = ?").bind(book_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::not_found(format!("saved book '{book_id}'")));
    }
    Ok(())
}

pub async fn list_saved_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT b.* FROM books b
        JOIN saved_books sb ON sb.book_id = b.id
        ORDER BY sb.priority DESC, sb.saved_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(books)
}

// ---- downloads ------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub async fn record_download(
    pool: &SqlitePool,
    book_id: &str,
    credential_identity: Option<&str>,
    filename: &str,
    file_path: &str,
    size: Option<i64>,
    status: DownloadStatus,
    error_message: Option<&str>,
) -> Result<Download> {
    let now = Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO downloads (
            book_id, credential_identity, filename, file_path, size, status, error_message, downloaded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(book_id)
    .bind(credential_identity)
    .bind(filename)
    .bind(file_path)
    .bind(size)
    .bind(status.as_str())
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(CoreError::from)
}

pub async fn list_recent_downloads(pool: &SqlitePool, limit: i64) -> Result<Vec<Download>> {
    let downloads = sqlx::query_as::<_, Download>("SELECT * FROM downloads ORDER BY downloaded_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(downloads)
}

pub async fn list_downloads_by_credential(pool: &SqlitePool, credential_identity: &str) -> Result<Vec<Download>> {
    let downloads = sqlx::query_as::<_, Download>(
        "SELECT * FROM downloads WHERE credential_identity = ? ORDER BY downloaded_at DESC",
    )
    .bind(credential_identity)
    .fetch_all(pool)
    .await?;
    Ok(downloads)
}

// ---- search history ---------------------------------------------------------

pub async fn record_search<'e, E>(executor: E, raw_query: &str, filters_json: &str) -> Result<SearchQuery>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = sqlx::query_as::<_, SearchQuery>(
        "INSERT INTO search_history (raw_query, filters_json, found_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(raw_query)
    .bind(filters_json)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;
    Ok(query)
}

pub async fn list_recent_searches(pool: &SqlitePool, limit: i64) -> Result<Vec<SearchQuery>> {
    let queries = sqlx::query_as::<_, SearchQuery>("SELECT * FROM search_history ORDER BY found_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::database::Database;

    fn sample_book(id: &str) -> NewBook {
        NewBook {
            id: id.to_string(),
            hash: format!("hash-{id}"),
            title: "Example Title".to_string(),
            authors_raw: "Jane Doe, John Smith".to_string(),
            year: Some("2020".to_string()),
            publisher: None,
            language: Some("en".to_string()),
            extension: Some("epub".to_string()),
            filesize_human: Some("2 MB".to_string()),
            filesize_bytes: Some(2_000_000),
            cover_url: None,
            description: None,
            isbn: None,
            edition: None,
            pages: Some(300),
        }
    }

    #[tokio::test]
    async fn upsert_book_is_idempotent_on_external_id() {
        let db = Database::new_in_memory().await.unwrap();
        let mut book = sample_book("ext-1");
        upsert_book(db.pool(), &book).await.unwrap();
        book.title = "Updated Title".to_string();
        upsert_book(db.pool(), &book).await.unwrap();

        assert_eq!(count_books(db.pool()).await.unwrap(), 1);
        let stored = get_book(db.pool(), "ext-1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Updated Title");
    }

    #[tokio::test]
    async fn deleting_book_cascades_to_saved_and_downloads() {
        let db = Database::new_in_memory().await.unwrap();
        let book = sample_book("ext-2");
        upsert_book(db.pool(), &book).await.unwrap();
        save_book(db.pool(), "ext-2", None, None, 0).await.unwrap();
        record_download(db.pool(), "ext-2", None, "f.epub", "/tmp/f.epub", Some(10), DownloadStatus::Completed, None)
            .await
            .unwrap();

        delete_book(db.pool(), "ext-2").await.unwrap();

        assert!(list_saved_books(db.pool()).await.unwrap().is_empty());
        assert!(list_recent_downloads(db.pool(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_name_uniqueness_is_enforced() {
        let db = Database::new_in_memory().await.unwrap();
        create_list(db.pool(), "favorites", None).await.unwrap();
        let err = create_list(db.pool(), "favorites", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn search_filters_by_language_and_year_range() {
        let db = Database::new_in_memory().await.unwrap();
        let mut b1 = sample_book("a");
        b1.language = Some("en".to_string());
        b1.year = Some("2010".to_string());
        let mut b2 = sample_book("b");
        b2.language = Some("fr".to_string());
        b2.year = Some("2020".to_string());
        upsert_book(db.pool(), &b1).await.unwrap();
        upsert_book(db.pool(), &b2).await.unwrap();

        let filter = BookFilter {
            language: Some("en".to_string()),
            limit: 10,
            ..Default::default()
        };
        let results = search_books(db.pool(), &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn search_filters_by_author_substring_via_join() {
        let db = Database::new_in_memory().await.unwrap();
        upsert_book(db.pool(), &sample_book("a")).await.unwrap();
        upsert_book(db.pool(), &sample_book("b")).await.unwrap();
        link_book_author(db.pool(), "a", get_or_create_author(db.pool(), "Jane Doe").await.unwrap().id, 0)
            .await
            .unwrap();
        link_book_author(db.pool(), "b", get_or_create_author(db.pool(), "Someone Else").await.unwrap().id, 0)
            .await
            .unwrap();

        let filter = BookFilter {
            author_contains: Some("Jane".to_string()),
            limit: 10,
            ..Default::default()
        };
        let results = search_books(db.pool(), &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");

        assert_eq!(count_filtered_books(db.pool(), &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_orders_by_title_then_id_for_deterministic_paging() {
        let db = Database::new_in_memory().await.unwrap();
        let mut b1 = sample_book("z");
        b1.title = "Same Title".to_string();
        let mut b2 = sample_book("a");
        b2.title = "Same Title".to_string();
        upsert_book(db.pool(), &b1).await.unwrap();
        upsert_book(db.pool(), &b2).await.unwrap();

        let filter = BookFilter { limit: 10, ..Default::default() };
        let results = search_books(db.pool(), &filter).await.unwrap();
        assert_eq!(results.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["a", "z"]);
    }

    #[tokio::test]
    async fn count_filtered_books_matches_search_results_count() {
        let db = Database::new_in_memory().await.unwrap();
        let mut b1 = sample_book("a");
        b1.extension = Some("epub".to_string());
        let mut b2 = sample_book("b");
        b2.extension = Some("pdf".to_string());
        upsert_book(db.pool(), &b1).await.unwrap();
        upsert_book(db.pool(), &b2).await.unwrap();

        let filter = BookFilter { extension: Some("pdf".to_string()), limit: 10, ..Default::default() };
        assert_eq!(count_filtered_books(db.pool(), &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_book_rejects_empty_title() {
        let db = Database::new_in_memory().await.unwrap();
        let mut book = sample_book("ext-3");
        book.title = "   ".to_string();
        let err = upsert_book(db.pool(), &book).await.unwrap_err();
        assert!(matches!(err, CoreError::Catalog(_)));
        assert_eq!(count_books(db.pool()).await.unwrap(), 0);
    }
}
