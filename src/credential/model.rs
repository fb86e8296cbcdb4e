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

//! Plain record types for the credential domain (§3.1, §9).
//!
//! These are constructed explicitly by callers; serialization to/from the
//! wire formats in §6.1/§6.2 lives in `store.rs`/`state.rs`, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of credential states (§3.1). Encoded as a tagged enum rather
/// than a free-form string anywhere except the wire format in §6.2, where
/// the lowercase string forms below are what actually round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Valid,
    Invalid,
    Exhausted,
    Unknown,
}

impl Default for CredentialStatus {
    fn default() -> Self {
        CredentialStatus::Unknown
    }
}

/// Exactly one of the two authentication shapes a credential can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthShape {
    Password { email: String, password: String },
    Token { user_id: String, user_key: String },
}

impl AuthShape {
    /// The stable identity key: email for password credentials, numeric user
    /// id for token credentials (glossary).
    pub fn identity_key(&self) -> &str {
        match self {
            AuthShape::Password { email, .. } => email,
            AuthShape::Token { user_id, .. } => user_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub name: Option<String>,
    pub auth: AuthShape,
    pub enabled: bool,
    pub status: CredentialStatus,
    /// Remaining daily downloads, or -1 when unknown.
    pub downloads_left: i64,
    pub last_used: Option<DateTime<Utc>>,
    pub last_validated: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(name: Option<String>, auth: AuthShape, enabled: bool) -> Self {
        Self {
            name,
            auth,
            enabled,
            status: CredentialStatus::Unknown,
            downloads_left: -1,
            last_used: None,
            last_validated: None,
        }
    }

    pub fn identity_key(&self) -> &str {
        self.auth.identity_key()
    }

    /// §4.3/glossary: enabled, status in {VALID, UNKNOWN}, downloadsLeft != 0.
    pub fn is_available(&self) -> bool {
        self.enabled
            && matches!(
                self.status,
                CredentialStatus::Valid | CredentialStatus::Unknown
            )
            && self.downloads_left != 0
    }
}
