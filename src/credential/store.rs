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

//! Credential Store (C1, §4.1).
//!
//! Loads credentials from exactly one of two sources. Which source applies
//! is decided by an explicit [`Source`] value rather than by try/open and
//! catching the failure (§9 "Configuration dispatch").

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::credential::model::{AuthShape, Credential};
use crate::error::{CoreError, Result};

/// Deterministic choice of credential source, computed up front instead of
/// discovered via exception control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Structured(PathBuf),
    Environment,
}

pub const CREDENTIALS_FILE_ENV: &str = "ZLIBRARY_CREDENTIALS_FILE";
const DEFAULT_CREDENTIALS_FILENAME: &str = "credentials.toml";

/// Result of loading the credential set: the usable list plus diagnostics
/// about entries that were present but disabled (§4.1).
#[derive(Debug, Clone, Default)]
pub struct LoadedCredentials {
    pub credentials: Vec<Credential>,
    /// Relative path named by the file's own `state_file` key, if any.
    pub state_file: Option<String>,
    pub total_entries: usize,
    pub disabled_entries: usize,
}

/// Picks §4.1's source in order: an explicit path, then `ZLIBRARY_CREDENTIALS_FILE`,
/// then a default path if it exists, else the environment-variable format.
pub fn detect_source(explicit_path: Option<&Path>) -> Source {
    if let Some(path) = explicit_path {
        return Source::Structured(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CREDENTIALS_FILE_ENV) {
        return Source::Structured(PathBuf::from(path));
    }
    let default_path = default_credentials_path();
    if default_path.exists() {
        return Source::Structured(default_path);
    }
    Source::Environment
}

fn default_credentials_path() -> PathBuf {
    crate::catalog::database::home_dir()
        .join(".zlibrary")
        .join(DEFAULT_CREDENTIALS_FILENAME)
}

pub fn load_credentials(explicit_path: Option<&Path>) -> Result<LoadedCredentials> {
    match detect_source(explicit_path) {
        Source::Structured(path) => load_structured(&path),
        Source::Environment => load_from_environment(),
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    state_file: Option<String>,
    #[serde(default)]
    credentials: Vec<CredentialEntry>,
}

#[derive(Debug, Deserialize)]
struct CredentialEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_key: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn load_structured(path: &Path) -> Result<LoadedCredentials> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CoreError::config(format!(
            "failed to read credential file {}: {e}",
            path.display()
        ))
    })?;
    let parsed: CredentialsFile = toml::from_str(&raw).map_err(|e| {
        CoreError::config(format!(
            "failed to parse credential file {}: {e}",
            path.display()
        ))
    })?;

    let total_entries = parsed.credentials.len();
    let mut credentials = Vec::with_capacity(total_entries);
    let mut disabled_entries = 0usize;
    let mut seen_identities = std::collections::HashSet::new();

    for (index, entry) in parsed.credentials.into_iter().enumerate() {
        let auth = auth_shape_for_entry(&entry, index)?;
        if !seen_identities.insert(auth.identity_key().to_string()) {
            return Err(CoreError::config(format!(
                "duplicate credential identity '{}' at entry {index}",
                auth.identity_key()
            )));
        }
        if !entry.enabled {
            disabled_entries += 1;
            continue;
        }
        credentials.push(Credential::new(entry.name, auth, entry.enabled));
    }

    tracing::info!(
        total = total_entries,
        enabled = credentials.len(),
        disabled = disabled_entries,
        source = %path.display(),
        "loaded credential file"
    );

    Ok(LoadedCredentials {
        credentials,
        state_file: parsed.state_file,
        total_entries,
        disabled_entries,
    })
}

fn auth_shape_for_entry(entry: &CredentialEntry, index: usize) -> Result<AuthShape> {
    let has_password_shape = entry.email.is_some() || entry.password.is_some();
    let has_token_shape = entry.user_id.is_some() || entry.user_key.is_some();

    match (has_password_shape, has_token_shape) {
        (true, true) => Err(CoreError::config(format!(
            "credential entry {index} specifies both email/password and user_id/user_key"
        ))),
        (false, false) => Err(CoreError::config(format!(
            "credential entry {index} specifies neither email/password nor user_id/user_key"
        ))),
        (true, false) => {
            let email = entry
                .email
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CoreError::config(format!("credential entry {index} missing email")))?;
            let password = entry.password.clone().ok_or_else(|| {
                CoreError::config(format!("credential entry {index} missing password"))
            })?;
            Ok(AuthShape::Password { email, password })
        }
        (false, true) => {
            let user_id = entry
                .user_id
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    CoreError::config(format!("credential entry {index} missing user_id"))
                })?;
            let user_key = entry.user_key.clone().ok_or_else(|| {
                CoreError::config(format!("credential entry {index} missing user_key"))
            })?;
            Ok(AuthShape::Token { user_id, user_key })
        }
    }
}

/// §4.1's second source: a single credential from the process environment,
/// either `{EMAIL, PASSWORD}` or `{USERID, USERKEY}`.
fn load_from_environment() -> Result<LoadedCredentials> {
    let email = std::env::var("EMAIL").ok().filter(|v| !v.trim().is_empty());
    let password = std::env::var("PASSWORD").ok();
    let user_id = std::env::var("USERID").ok().filter(|v| !v.trim().is_empty());
    let user_key = std::env::var("USERKEY").ok();

    let auth = match (email, password, user_id, user_key) {
        (Some(email), Some(password), _, _) => AuthShape::Password { email, password },
        (_, _, Some(user_id), Some(user_key)) => AuthShape::Token { user_id, user_key },
        _ => {
            tracing::info!("no credential file found and no environment credential set; returning empty set");
            return Ok(LoadedCredentials::default());
        }
    };

    Ok(LoadedCredentials {
        credentials: vec![Credential::new(None, auth, true)],
        state_file: None,
        total_entries: 1,
        disabled_entries: 0,
    })
}
