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

//! Catalog entity types (§3.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: String,
    pub hash: String,
    pub title: String,
    pub year: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub extension: Option<String>,
    pub filesize_human: Option<String>,
    pub filesize_bytes: Option<i64>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub edition: Option<String>,
    pub pages: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when ingesting a search result; `id`/`hash`
/// are the stable external identifiers a book is deduplicated on.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: String,
    pub hash: String,
    pub title: String,
    pub authors_raw: String,
    pub year: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub extension: Option<String>,
    pub filesize_human: Option<String>,
    pub filesize_bytes: Option<i64>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub edition: Option<String>,
    pub pages: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookAuthor {
    pub book_id: String,
    pub author_id: i64,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReadingList {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ListBook {
    pub list_id: i64,
    pub book_id: String,
    pub position: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SavedBook {
    pub id: i64,
    pub book_id: String,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub priority: i64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => DownloadStatus::Completed,
            _ => DownloadStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Download {
    pub id: i64,
    pub book_id: String,
    pub credential_identity: Option<String>,
    pub filename: String,
    pub file_path: String,
    pub size: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SearchQuery {
    pub id: i64,
    pub raw_query: String,
    pub filters_json: String,
    pub found_at: DateTime<Utc>,
}

/// Splits a raw author string into individual names, the only parsing this
/// crate performs on free-text upstream fields. Recognizes `,`, `;`, and the
/// literal word `and` as separators and trims surrounding whitespace.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_comma_semicolon_and_and() {
        assert_eq!(
            split_authors("a; b and c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn collapses_extra_whitespace_and_empty_segments() {
        assert_eq!(split_authors("  Jane Doe ,, John Smith "), vec!["Jane Doe", "John Smith"]);
    }

    #[test]
    fn single_author_returns_one_entry() {
        assert_eq!(split_authors("Jane Doe"), vec!["Jane Doe"]);
    }

    #[test]
    fn download_status_round_trips_through_string() {
        assert_eq!(DownloadStatus::parse("completed"), DownloadStatus::Completed);
        assert_eq!(DownloadStatus::Completed.as_str(), "completed");
    }
}
