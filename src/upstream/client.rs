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

//! `reqwest`-backed implementation of [`super::UpstreamClient`].
//!
//! The wire contract of the real Z-Library-style API is deliberately treated
//! as opaque (glossary: "Upstream ... whose only guarantees are stated under
//! §4.3's probe semantics") — this client issues generic JSON requests against
//! a configurable base URL and classifies the response, rather than hard-coding
//! a specific third-party API surface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::credential::model::{AuthShape, Credential};
use crate::error::{CoreError, Result};
use crate::upstream::{BookRecord, DownloadPayload, ProbeOutcome, SearchFilters, Session, UpstreamClient};

/// Default per-call timeout (§5: "configurable per-call timeout (default: 30 seconds)").
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct HttpUpstreamClient {
    http: Client,
    base_url: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| CoreError::upstream_transient(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn login_payload(credential: &Credential) -> Value {
        match &credential.auth {
            AuthShape::Password { email, password } => serde_json::json!({
                "email": email,
                "password": password,
            }),
            AuthShape::Token { user_id, user_key } => serde_json::json!({
                "user_id": user_id,
                "user_key": user_key,
            }),
        }
    }

    /// Timeouts, connection failures, and any other transport-level
    /// `reqwest::Error` are all §5/§7's `UpstreamTransient` — the taxonomy
    /// doesn't distinguish among network failure causes, only upstream
    /// status codes (handled separately per call site).
    fn classify_transport_error(err: reqwest::Error) -> CoreError {
        CoreError::upstream_transient(err.to_string())
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn probe(&self, credential: &Credential) -> Result<ProbeOutcome> {
        let url = format!("{}/profile", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("identity", credential.identity_key())])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return Ok(ProbeOutcome::NetworkError(e.to_string())),
        };

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| CoreError::upstream_transient(e.to_string()))?;
                let downloads_left = body.get("downloads_left").and_then(Value::as_i64);
                if downloads_left == Some(0) {
                    Ok(ProbeOutcome::QuotaExhausted)
                } else {
                    Ok(ProbeOutcome::Success { downloads_left })
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(ProbeOutcome::AuthRejected),
            StatusCode::TOO_MANY_REQUESTS => Ok(ProbeOutcome::QuotaExhausted),
            status if status.is_server_error() => {
                Ok(ProbeOutcome::NetworkError(format!("server error: {status}")))
            }
            status => Ok(ProbeOutcome::NetworkError(format!("unexpected status: {status}"))),
        }
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Session> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&Self::login_payload(credential))
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        match response.status() {
            StatusCode::OK => Ok(Session {
                identity_key: credential.identity_key().to_string(),
                created_at: chrono::Utc::now(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CoreError::upstream_auth("credential rejected at login"))
            }
            status => Err(CoreError::upstream_transient(format!(
                "unexpected login status: {status}"
            ))),
        }
    }

    async fn search(
        &self,
        session: &Session,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<BookRecord>> {
        let url = format!("{}/search", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .query(&[("identity", session.identity_key.as_str()), ("q", query)])
            .query(&[("page", filters.page), ("limit", filters.limit)]);
        if let Some(year_from) = filters.year_from {
            request = request.query(&[("yearFrom", year_from)]);
        }
        if let Some(year_to) = filters.year_to {
            request = request.query(&[("yearTo", year_to)]);
        }
        if let Some(language) = &filters.language {
            request = request.query(&[("language", language)]);
        }
        if let Some(extension) = &filters.extension {
            request = request.query(&[("extension", extension)]);
        }

        let response = request.send().await.map_err(Self::classify_transport_error)?;
        match response.status() {
            StatusCode::OK => response
                .json::<Vec<BookRecord>>()
                .await
                .map_err(|e| CoreError::upstream_transient(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CoreError::upstream_auth("session rejected during search"))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(CoreError::UpstreamQuota),
            status => Err(CoreError::upstream_transient(format!(
                "unexpected search status: {status}"
            ))),
        }
    }

    async fn download(&self, session: &Session, book: &BookRecord) -> Result<DownloadPayload> {
        let url = format!("{}/book/{}/download", self.base_url, book.id);
        let response = self
            .http
            .get(&url)
            .query(&[("identity", session.identity_key.as_str()), ("hash", &book.hash)])
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        match response.status() {
            StatusCode::OK => {
                let suggested_filename = response
                    .headers()
                    .get(reqwest::header::CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_filename_from_content_disposition)
                    .unwrap_or_else(|| format!("{}.{}", book.id, book.extension.as_deref().unwrap_or("bin")));
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| CoreError::upstream_transient(e.to_string()))?
                    .to_vec();
                Ok(DownloadPayload {
                    suggested_filename,
                    bytes,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CoreError::upstream_auth("session rejected during download"))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(CoreError::UpstreamQuota),
            status => Err(CoreError::upstream_transient(format!(
                "unexpected download status: {status}"
            ))),
        }
    }
}

fn parse_filename_from_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
}
