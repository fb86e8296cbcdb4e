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

//! Error types for the core.
//!
//! A single `thiserror`-derived enum carries the full error taxonomy. External
//! errors are converted at the boundary where they occur rather than left to
//! propagate as foreign types, so every public function in this crate returns
//! `Result<T>` from this module.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Credential file or environment configuration is malformed or absent.
    #[error("configuration error: {0}")]
    Config(String),

    /// No credential in the configured set could be validated.
    #[error("no valid credentials available")]
    NoValidCredentials,

    /// Every credential is unavailable (disabled, invalid, or exhausted).
    #[error("all credentials exhausted")]
    AllCredentialsExhausted,

    /// Network, timeout, or 5xx-class upstream failure. Retryable.
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    /// Upstream rejected the credential's authentication.
    #[error("upstream authentication error: {0}")]
    UpstreamAuth(String),

    /// Upstream reported the credential's quota is exhausted.
    #[error("upstream quota exhausted")]
    UpstreamQuota,

    /// Catalog constraint violation or corruption; the triggering transaction
    /// is always rolled back before this variant is returned.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// A requested book, list, or credential identity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint (list name, saved-book) was violated.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The caller's cancellation signal fired before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::Config(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        CoreError::Catalog(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        CoreError::Duplicate(msg.into())
    }

    pub fn upstream_transient(msg: impl Into<String>) -> Self {
        CoreError::UpstreamTransient(msg.into())
    }

    pub fn upstream_auth(msg: impl Into<String>) -> Self {
        CoreError::UpstreamAuth(msg.into())
    }

    /// Converts a raw `sqlx::Error` into the catalog taxonomy, recognizing
    /// the constraint violations the repository layer can actually hit.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("2067") || db_err.code().as_deref() == Some("1555")
            {
                return CoreError::Duplicate(db_err.message().to_string());
            }
        }
        CoreError::Catalog(err.to_string())
    }

    /// Retryable according to §7: transient upstream failures only.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::UpstreamTransient(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, CoreError::UpstreamAuth(_))
    }

    pub fn is_quota_error(&self) -> bool {
        matches!(self, CoreError::UpstreamQuota)
    }

    /// Exit code mapping for a driver following §6.4.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Config(_) | CoreError::Toml(_) => 2,
            CoreError::NoValidCredentials => 3,
            CoreError::AllCredentialsExhausted => 4,
            CoreError::Catalog(_) | CoreError::NotFound(_) | CoreError::Duplicate(_) => 5,
            CoreError::Cancelled => 6,
            CoreError::UpstreamTransient(_)
            | CoreError::UpstreamAuth(_)
            | CoreError::UpstreamQuota
            | CoreError::Io(_)
            | CoreError::Json(_) => 1,
        }
    }

    /// Text safe to show a user: never echoes a credential secret. Callers
    /// that construct these variants are responsible for only ever including
    /// a credential's identity key (never a password/userKey) in the message.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::from_sqlx(err)
    }
}
