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

//! Catalog Services (C7, §4.7).
//!
//! Orchestrates repository calls into the operations the rest of the crate
//! actually needs: ingesting a page of search results, browsing with joined
//! author names, list/save management, download bookkeeping, import/export,
//! and maintenance (stats, vacuum).

use sqlx::SqlitePool;

use crate::error::{CoreError, Result};
use crate::upstream::BookRecord;

use super::models::{split_authors, Book, Download, DownloadStatus, NewBook, ReadingList, SavedBook};
use super::repository::{self, BookFilter};

/// A book joined with its parsed author names, the shape `browse` and
/// `export` return (§4.6: "a single join query, no N+1").
#[derive(Debug, Clone)]
pub struct BookWithAuthors {
    pub book: Book,
    pub authors: Vec<String>,
}

/// Ingests one page of upstream search results: upserts each book, parses
/// and links its authors, and records the search in history. Runs inside a
/// single transaction so a partial failure leaves no partial page behind.
pub async fn ingest_search_results(
    pool: &SqlitePool,
    raw_query: &str,
    filters_json: &str,
    results: &[BookRecord],
) -> Result<Vec<Book>> {
    let mut tx = pool.begin().await?;
    let mut ingested = Vec::with_capacity(results.len());

    for record in results {
        let new_book = NewBook {
            id: record.id.clone(),
            hash: record.hash.clone(),
            title: record.title.clone(),
            authors_raw: record.author.clone(),
            year: record.year.clone(),
            publisher: record.publisher.clone(),
            language: record.language.clone(),
            extension: record.extension.clone(),
            filesize_human: record.filesize_human.clone(),
            filesize_bytes: record.filesize_bytes,
            cover_url: record.cover_url.clone(),
            description: record.description.clone(),
            isbn: record.isbn.clone(),
            edition: record.edition.clone(),
            pages: record.pages.map(i64::from),
        };

        let book = repository::upsert_book(&mut *tx, &new_book).await?;
        repository::unlink_authors_for_book(&mut *tx, &book.id).await?;
        for (position, name) in split_authors(&new_book.authors_raw).into_iter().enumerate() {
            let author = repository::get_or_create_author(&mut *tx, &name).await?;
            repository::link_book_author(&mut *tx, &book.id, author.id, position as i64).await?;
        }
        ingested.push(book);
    }

    repository::record_search(&mut *tx, raw_query, filters_json).await?;
    tx.commit().await?;
    Ok(ingested)
}

pub async fn browse(pool: &SqlitePool, filter: &BookFilter) -> Result<Vec<BookWithAuthors>> {
    let books = repository::search_books(pool, filter).await?;
    let mut out = Vec::with_capacity(books.len());
    for book in books {
        let authors = repository::authors_for_book(pool, &book.id)
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();
        out.push(BookWithAuthors { book, authors });
    }
    Ok(out)
}

pub async fn show_book(pool: &SqlitePool, id: &str) -> Result<BookWithAuthors> {
    let book = repository::get_book(pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("book '{id}'")))?;
    let authors = repository::authors_for_book(pool, id).await?.into_iter().map(|a| a.name).collect();
    Ok(BookWithAuthors { book, authors })
}

// ---- lists ------------------------------------------------------------------

pub async fn create_list(pool: &SqlitePool, name: &str, description: Option<&str>) -> Result<ReadingList> {
    repository::create_list(pool, name, description).await
}

pub async fn add_to_list(pool: &SqlitePool, list_name: &str, book_id: &str) -> Result<()> {
    let list = repository::get_list_by_name(pool, list_name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("list '{list_name}'")))?;
    repository::get_book(pool, book_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("book '{book_id}'")))?;
    let position = repository::list_books_entries(pool, list.id).await?.len() as i64;
    repository::add_book_to_list(pool, list.id, book_id, position).await
}

pub async fn remove_from_list(pool: &SqlitePool, list_name: &str, book_id: &str) -> Result<()> {
    let list = repository::get_list_by_name(pool, list_name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("list '{list_name}'")))?;
    repository::remove_book_from_list(pool, list.id, book_id).await
}

pub async fn list_books(pool: &SqlitePool, list_name: &str) -> Result<Vec<Book>> {
    let list = repository::get_list_by_name(pool, list_name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("list '{list_name}'")))?;
    repository::books_in_list(pool, list.id).await
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ReadingList>> {
    repository::list_all_lists(pool).await
}

// ---- saved books --------------------------------------------------------

pub async fn save(pool: &SqlitePool, book_id: &str, notes: Option<&str>, tags: Option<&str>, priority: i64) -> Result<SavedBook> {
    repository::get_book(pool, book_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("book '{book_id}'")))?;
    repository::save_book(pool, book_id, notes, tags, priority).await
}

pub async fn unsave(pool: &SqlitePool, book_id: &str) -> Result<()> {
    repository::unsave_book(pool, book_id).await
}

pub async fn saved(pool: &SqlitePool) -> Result<Vec<Book>> {
    repository::list_saved_books(pool).await
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
    repository::record_download(pool, book_id, credential_identity, filename, file_path, size, status, error_message).await
}

pub async fn recent_downloads(pool: &SqlitePool, limit: i64) -> Result<Vec<Download>> {
    repository::list_recent_downloads(pool, limit).await
}

// ---- import / export --------------------------------------------------------

const EXPORT_COLUMNS: [&str; 9] = ["id", "title", "authors", "year", "publisher", "language", "extension", "filesize", "isbn"];

pub async fn export_json(pool: &SqlitePool) -> Result<String> {
    let filter = BookFilter { limit: i64::MAX, ..Default::default() };
    let rows = browse(pool, &filter).await?;
    let records: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "id": r.book.id,
                "title": r.book.title,
                "authors": r.authors.join("; "),
                "year": r.book.year,
                "publisher": r.book.publisher,
                "language": r.book.language,
                "extension": r.book.extension,
                "filesize": r.book.filesize_bytes,
                "isbn": r.book.isbn,
            })
        })
        .collect();
    serde_json::to_string_pretty(&records).map_err(CoreError::from)
}

pub async fn export_csv(pool: &SqlitePool) -> Result<String> {
    let filter = BookFilter { limit: i64::MAX, ..Default::default() };
    let rows = browse(pool, &filter).await?;

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|e| CoreError::catalog(format!("csv write error: {e}")))?;
    for row in rows {
        writer
            .write_record([
                row.book.id.as_str(),
                row.book.title.as_str(),
                &row.authors.join("; "),
                row.book.year.as_deref().unwrap_or(""),
                row.book.publisher.as_deref().unwrap_or(""),
                row.book.language.as_deref().unwrap_or(""),
                row.book.extension.as_deref().unwrap_or(""),
                &row.book.filesize_bytes.map(|n| n.to_string()).unwrap_or_default(),
                row.book.isbn.as_deref().unwrap_or(""),
            ])
            .map_err(|e| CoreError::catalog(format!("csv write error: {e}")))?;
    }
    let bytes = writer.into_inner().map_err(|e| CoreError::catalog(format!("csv flush error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::catalog(format!("csv encoding error: {e}")))
}

/// Imports a JSON array produced by `export_json`. Runs in a single
/// transaction: any record missing `id` or `title` aborts the whole import
/// with nothing committed.
pub async fn import_json(pool: &SqlitePool, json: &str) -> Result<usize> {
    let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for record in &records {
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::catalog("import record missing 'id'"))?;
        let title = record
            .get("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::catalog("import record missing 'title'"))?;

        let new_book = NewBook {
            id: id.to_string(),
            hash: record.get("hash").and_then(|v| v.as_str()).unwrap_or(id).to_string(),
            title: title.to_string(),
            authors_raw: record.get("authors").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            year: record.get("year").and_then(|v| v.as_str()).map(str::to_string),
            publisher: record.get("publisher").and_then(|v| v.as_str()).map(str::to_string),
            language: record.get("language").and_then(|v| v.as_str()).map(str::to_string),
            extension: record.get("extension").and_then(|v| v.as_str()).map(str::to_string),
            filesize_human: None,
            filesize_bytes: record.get("filesize").and_then(|v| v.as_i64()),
            cover_url: None,
            description: None,
            isbn: record.get("isbn").and_then(|v| v.as_str()).map(str::to_string),
            edition: None,
            pages: None,
        };

        repository::upsert_book(&mut *tx, &new_book).await?;
        repository::unlink_authors_for_book(&mut *tx, &new_book.id).await?;
        for (position, name) in split_authors(&new_book.authors_raw).into_iter().enumerate() {
            let author = repository::get_or_create_author(&mut *tx, &name).await?;
            repository::link_book_author(&mut *tx, &new_book.id, author.id, position as i64).await?;
        }
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

// ---- maintenance ------------------------------------------------------------

/// §4.7's stats contract: total books, distinct languages, distinct formats,
/// total downloads, and the database's on-disk file size.
#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub book_count: i64,
    pub distinct_languages: i64,
    pub distinct_formats: i64,
    pub total_downloads: i64,
    pub database_file_size: u64,
    pub database: super::database::DatabaseStats,
}

pub async fn stats(db: &super::database::Database) -> Result<CatalogStats> {
    Ok(CatalogStats {
        book_count: repository::count_books(db.pool()).await?,
        distinct_languages: repository::count_distinct_languages(db.pool()).await?,
        distinct_formats: repository::count_distinct_formats(db.pool()).await?,
        total_downloads: repository::count_downloads(db.pool()).await?,
        database_file_size: db.file_size_bytes().await?,
        database: db.get_stats().await?,
    })
}

pub async fn vacuum(db: &super::database::Database) -> Result<()> {
    db.vacuum().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::database::Database;

    fn record(id: &str, author: &str) -> BookRecord {
        BookRecord {
            id: id.to_string(),
            hash: format!("h-{id}"),
            title: format!("Title {id}"),
            author: author.to_string(),
            year: Some("2021".to_string()),
            publisher: None,
            language: Some("en".to_string()),
            extension: Some("epub".to_string()),
            filesize_human: None,
            filesize_bytes: Some(1024),
            cover_url: None,
            description: None,
            isbn: None,
            edition: None,
            pages: None,
        }
    }

    #[tokio::test]
    async fn ingest_links_parsed_authors_and_records_search() {
        let db = Database::new_in_memory().await.unwrap();
        let results = vec![record("a", "Jane Doe; John Smith")];
        ingest_search_results(db.pool(), "rust", "{}", &results).await.unwrap();

        let shown = show_book(db.pool(), "a").await.unwrap();
        assert_eq!(shown.authors, vec!["Jane Doe".to_string(), "John Smith".to_string()]);

        let history = repository::list_recent_searches(db.pool(), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].raw_query, "rust");
    }

    #[tokio::test]
    async fn export_json_then_import_json_round_trips_book_count() {
        let db = Database::new_in_memory().await.unwrap();
        ingest_search_results(db.pool(), "q", "{}", &[record("a", "Jane Doe"), record("b", "John Smith")])
            .await
            .unwrap();

        let json = export_json(db.pool()).await.unwrap();

        let db2 = Database::new_in_memory().await.unwrap();
        let imported = import_json(db2.pool(), &json).await.unwrap();
        assert_eq!(imported, 2);
        assert_eq!(repository::count_books(db2.pool()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn import_json_aborts_atomically_on_missing_title() {
        let db = Database::new_in_memory().await.unwrap();
        let bad = serde_json::json!([{"id": "a", "title": "Good"}, {"id": "b"}]).to_string();
        let err = import_json(db.pool(), &bad).await.unwrap_err();
        assert!(matches!(err, CoreError::Catalog(_)));
        assert_eq!(repository::count_books(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn import_json_aborts_atomically_on_empty_title() {
        let db = Database::new_in_memory().await.unwrap();
        let bad = serde_json::json!([{"id": "a", "title": "Good"}, {"id": "b", "title": "  "}]).to_string();
        let err = import_json(db.pool(), &bad).await.unwrap_err();
        assert!(matches!(err, CoreError::Catalog(_)));
        assert_eq!(repository::count_books(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ingest_search_results_rejects_empty_title() {
        let db = Database::new_in_memory().await.unwrap();
        let mut bad = record("a", "Jane Doe");
        bad.title = String::new();
        let err = ingest_search_results(db.pool(), "q", "{}", &[bad]).await.unwrap_err();
        assert!(matches!(err, CoreError::Catalog(_)));
        assert_eq!(repository::count_books(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn export_csv_has_expected_header() {
        let db = Database::new_in_memory().await.unwrap();
        let csv_text = export_csv(db.pool()).await.unwrap();
        assert!(csv_text.starts_with("id,title,authors,year,publisher,language,extension,filesize,isbn"));
    }

    #[tokio::test]
    async fn stats_reports_distinct_languages_formats_and_downloads() {
        let db = Database::new_in_memory().await.unwrap();
        ingest_search_results(
            db.pool(),
            "q",
            "{}",
            &[record("a", "Jane Doe"), record("b", "John Smith")],
        )
        .await
        .unwrap();
        record_download(db.pool(), "a", None, "a.epub", "/tmp/a.epub", Some(10), DownloadStatus::Completed, None)
            .await
            .unwrap();

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.book_count, 2);
        assert_eq!(stats.distinct_languages, 1);
        assert_eq!(stats.distinct_formats, 1);
        assert_eq!(stats.total_downloads, 1);
    }
}
