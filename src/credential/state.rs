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

//! Rotation State (C2, §4.2, §6.2).
//!
//! Persists `current_index`, `last_rotation`, and a per-identity status map
//! as JSON. Unknown fields are preserved on round trip via `#[serde(flatten)]`
//! into a JSON map, satisfying §4.2's migration contract and testable
//! property 7 (byte-for-byte round trip under equivalent serialization).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::model::CredentialStatus;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatusEntry {
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub downloads_left: i64,
    #[serde(default)]
    pub status: CredentialStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RotationStateFile {
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub last_rotation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub credentials_status: HashMap<String, CredentialStatusEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Loads the rotation state file. A missing file is not an error (empty
/// state). A file that exists but fails to parse is also not an error: it is
/// logged as a recoverable warning and an empty state is returned, per §4.2.
pub fn load(path: &Path) -> RotationStateFile {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return RotationStateFile::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "rotation state file is corrupt, starting from empty state");
            RotationStateFile::default()
        }
    }
}

/// Atomically saves the rotation state: write to a sibling temp file, fsync,
/// then rename over the destination. Permissions are restricted to
/// owner-only on POSIX; best-effort elsewhere.
pub fn save(path: &Path, state: &RotationStateFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoded = serde_json::to_string_pretty(state)?;

    let tmp_path = sibling_temp_path(path);
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;
    }
    set_owner_only_permissions(&tmp_path);
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "rotation-state".to_string());
    let tmp_name = format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4());
    path.with_file_name(tmp_name)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_returns_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let state = load(&path);
        assert_eq!(state.current_index, 0);
        assert!(state.credentials_status.is_empty());
    }

    #[test]
    fn load_corrupt_file_returns_empty_state_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation-state.json");
        std::fs::write(&path, "{not valid json").unwrap();
        let state = load(&path);
        assert_eq!(state.current_index, 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation-state.json");

        let mut status = HashMap::new();
        status.insert(
            "user1@example.com".to_string(),
            CredentialStatusEntry {
                last_used: Some(Utc::now()),
                downloads_left: 8,
                status: CredentialStatus::Valid,
                extra: serde_json::Map::new(),
            },
        );
        let state = RotationStateFile {
            current_index: 1,
            last_rotation: Some(Utc::now()),
            credentials_status: status,
            extra: serde_json::Map::new(),
        };

        save(&path, &state).unwrap();
        let reloaded = load(&path);
        assert_eq!(reloaded.current_index, 1);
        assert_eq!(
            reloaded.credentials_status["user1@example.com"].downloads_left,
            8
        );
        // no stray temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn save_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation-state.json");
        std::fs::write(
            &path,
            r#"{"current_index":0,"last_rotation":null,"credentials_status":{},"future_field":"kept"}"#,
        )
        .unwrap();

        let state = load(&path);
        assert_eq!(
            state.extra.get("future_field").and_then(|v| v.as_str()),
            Some("kept")
        );

        save(&path, &state).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("future_field"));
    }
}
