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

//! Search/Download Orchestrator (C5, §4.5).
//!
//! Drives searches and downloads through the session pool, applies the
//! retry-then-rotate policy of §4.8, writes downloaded payloads to disk with
//! collision avoidance, and records every attempt (successful or failed)
//! through the catalog services.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::catalog::services;
use crate::error::{CoreError, Result};
use crate::session::SessionPool;
use crate::upstream::{BookRecord, SearchFilters, UpstreamClient};

pub struct Orchestrator {
    pool: std::sync::Arc<SessionPool>,
    upstream: std::sync::Arc<dyn UpstreamClient>,
    db: SqlitePool,
}

pub struct SearchOptions {
    pub save_to_catalog: bool,
}

impl Orchestrator {
    pub fn new(
        pool: std::sync::Arc<SessionPool>,
        upstream: std::sync::Arc<dyn UpstreamClient>,
        db: SqlitePool,
    ) -> Self {
        Self { pool, upstream, db }
    }

    /// Issues one search, applying at most one retry per credential before
    /// rotating, up to a full pass over the credential set (§4.5). Every
    /// credential is rotated after its externally-observable operation
    /// completes, success or failure alike (§1), so a successful search
    /// also advances the pool before returning.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<BookRecord>> {
        let filters = filters.clone().normalized();
        let results = self.search_with_retry(query, &filters, cancel).await?;

        if options.save_to_catalog && !results.is_empty() {
            let filters_json = serde_json::to_string(&SerializableFilters::from(&filters))?;
            services::ingest_search_results(&self.db, query, &filters_json, &results).await?;
        }
        self.pool.rotate().await.ok();
        Ok(results)
    }

    /// Iterates pages until the upstream returns fewer than `limit` results,
    /// rotating credentials between pages (§4.5 "all-pages variant").
    pub async fn search_all_pages(
        &self,
        query: &str,
        filters: &SearchFilters,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<BookRecord>> {
        let mut filters = filters.clone().normalized();
        let mut all = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let page_results = self.search(query, &filters, options, cancel).await?;
            let page_len = page_results.len();
            all.extend(page_results);

            if (page_len as u32) < filters.limit {
                break;
            }
            filters.page += 1;
        }
        Ok(all)
    }

    async fn search_with_retry(
        &self,
        query: &str,
        filters: &SearchFilters,
        cancel: &CancellationToken,
    ) -> Result<Vec<BookRecord>> {
        let attempts = self.pool.credential_count().await.max(1);
        let mut last_err = None;

        for _attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let session = self.pool.get_current().await?;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                result = self.upstream.search(&session, query, filters) => result,
            };

            match outcome {
                Ok(results) => return Ok(results),
                Err(err) if err.is_retryable() => {
                    let retry_session = self.pool.get_current().await?;
                    match self.upstream.search(&retry_session, query, filters).await {
                        Ok(results) => return Ok(results),
                        Err(err) => {
                            last_err = Some(err);
                            self.pool.rotate().await?;
                        }
                    }
                }
                Err(err) if err.is_auth_error() => {
                    let identity = self.pool.current_identity_key().await?;
                    self.pool.refresh(&identity).await.ok();
                    let session = self.pool.get_current().await?;
                    match self.upstream.search(&session, query, filters).await {
                        Ok(results) => return Ok(results),
                        Err(err) => {
                            self.pool.mark_current_invalid().await?;
                            last_err = Some(err);
                            self.pool.rotate().await?;
                        }
                    }
                }
                Err(err) if err.is_quota_error() => {
                    self.pool.mark_current_exhausted().await?;
                    last_err = Some(err);
                    self.pool.rotate().await?;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(CoreError::AllCredentialsExhausted))
    }

    /// Downloads one book into `destination_dir` (§4.5 "Download"). Any
    /// failure past credential/quota checks is recorded as a failed Download
    /// row without touching the credential's quota.
    pub async fn download(
        &self,
        book: &BookRecord,
        destination_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        // A depleted current credential isn't itself a failure: rotate onto
        // the next available one first, surfacing `AllCredentialsExhausted`
        // only when none remain.
        if self.pool.current_downloads_left().await? == 0 {
            self.pool.rotate().await?;
        }

        let session = self.pool.get_current().await?;
        let identity = self.pool.current_identity_key().await?;

        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            result = self.upstream.download(&session, book) => result,
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(err) => {
                services::record_download(
                    &self.db,
                    &book.id,
                    Some(&identity),
                    &payload_failure_filename(book),
                    "",
                    None,
                    crate::catalog::DownloadStatus::Failed,
                    Some(&err.to_string()),
                )
                .await?;
                return Err(err);
            }
        };

        let dest_path = unique_destination(destination_dir, &payload.suggested_filename);
        if let Err(io_err) = write_payload(&dest_path, &payload.bytes).await {
            services::record_download(
                &self.db,
                &book.id,
                Some(&identity),
                &payload.suggested_filename,
                &dest_path.display().to_string(),
                None,
                crate::catalog::DownloadStatus::Failed,
                Some(&io_err.to_string()),
            )
            .await?;
            return Err(CoreError::Io(io_err));
        }

        services::record_download(
            &self.db,
            &book.id,
            Some(&identity),
            &payload.suggested_filename,
            &dest_path.display().to_string(),
            Some(payload.bytes.len() as i64),
            crate::catalog::DownloadStatus::Completed,
            None,
        )
        .await?;

        self.pool.record_successful_download().await?;
        self.pool.rotate().await.ok();

        Ok(dest_path)
    }
}

fn payload_failure_filename(book: &BookRecord) -> String {
    format!("{}.{}", book.id, book.extension.as_deref().unwrap_or("bin"))
}

/// Appends a numeric suffix (`name (1).ext`, `name (2).ext`, ...) when the
/// suggested filename already exists in the destination directory.
fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|s| s.to_str());

    for n in 1.. {
        let next_name = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let next_path = dir.join(next_name);
        if !next_path.exists() {
            return next_path;
        }
    }
    unreachable!("destination directory cannot hold infinitely many collisions")
}

async fn write_payload(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

#[derive(serde::Serialize)]
struct SerializableFilters {
    year_from: Option<i32>,
    year_to: Option<i32>,
    language: Option<String>,
    extension: Option<String>,
    page: u32,
    limit: u32,
}

impl From<&SearchFilters> for SerializableFilters {
    fn from(f: &SearchFilters) -> Self {
        Self {
            year_from: f.year_from,
            year_to: f.year_to,
            language: f.language.clone(),
            extension: f.extension.clone(),
            page: f.page,
            limit: f.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_destination_appends_numeric_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("book.epub"), b"x").unwrap();
        let next = unique_destination(dir.path(), "book.epub");
        assert_eq!(next, dir.path().join("book (1).epub"));
    }

    #[test]
    fn unique_destination_is_unchanged_when_no_collision() {
        let dir = tempfile::tempdir().unwrap();
        let next = unique_destination(dir.path(), "book.epub");
        assert_eq!(next, dir.path().join("book.epub"));
    }
}
