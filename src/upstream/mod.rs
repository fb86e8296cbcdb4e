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

//! The opaque upstream service abstraction (glossary: "Upstream").
//!
//! The core only ever talks to the external Z-Library-style service through
//! this trait. The real implementation (`client::HttpUpstreamClient`) wraps
//! `reqwest`; tests substitute a stub that returns scripted outcomes, which
//! is how §8's end-to-end scenarios are made deterministic.

pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::model::Credential;
use crate::error::Result;

/// Outcome of the lightweight authenticated probe (§4.3's validation table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success { downloads_left: Option<i64> },
    AuthRejected,
    QuotaExhausted,
    NetworkError(String),
}

/// An authenticated session handle. Opaque beyond its identity key; the real
/// client stashes whatever cookies/tokens it needs behind this value.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Popular,
    Year,
    Title,
}

/// Recognized search filter fields (§4.5).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub language: Option<String>,
    pub extension: Option<String>,
    pub order: Option<SortOrder>,
    pub page: u32,
    pub limit: u32,
}

impl SearchFilters {
    /// Clamps `limit` into the documented `[1,100]` range (§4.5).
    pub fn normalized(mut self) -> Self {
        if self.page == 0 {
            self.page = 1;
        }
        self.limit = self.limit.clamp(1, 100);
        self
    }
}

/// A single upstream search result, as returned by the external service
/// before ingestion maps it onto the catalog's `Book` entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub hash: String,
    pub title: String,
    /// Raw, unparsed author string (e.g. "Smith, John and Jane Doe").
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub filesize_human: Option<String>,
    #[serde(default)]
    pub filesize_bytes: Option<i64>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub pages: Option<i32>,
}

/// The resolved file payload for a download (§4.5 step ii).
pub struct DownloadPayload {
    pub suggested_filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn probe(&self, credential: &Credential) -> Result<ProbeOutcome>;

    async fn authenticate(&self, credential: &Credential) -> Result<Session>;

    async fn search(
        &self,
        session: &Session,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<BookRecord>>;

    async fn download(&self, session: &Session, book: &BookRecord) -> Result<DownloadPayload>;
}
