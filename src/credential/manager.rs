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

//! Credential Manager (C3, §4.3).
//!
//! Owns the ordered credential list and the rotation cursor, performs
//! validation against the upstream probe, and synchronizes the rotation
//! state file after every mutation.

use std::path::PathBuf;

use chrono::Utc;

use crate::credential::model::{Credential, CredentialStatus};
use crate::credential::state::{self, CredentialStatusEntry, RotationStateFile};
use crate::error::{CoreError, Result};
use crate::upstream::{ProbeOutcome, UpstreamClient};

const VALIDATION_RETRY_ATTEMPTS: u32 = 2;

pub struct CredentialManager {
    credentials: Vec<Credential>,
    current_index: usize,
    state_path: PathBuf,
    /// Unknown fields from the loaded state document, preserved on save.
    document_extra: serde_json::Map<String, serde_json::Value>,
}

impl CredentialManager {
    /// Builds the manager from C1's credential list and the on-disk rotation
    /// state, applying §9's resolution of the open question: identities
    /// found in config but absent from the state map start UNKNOWN with an
    /// unknown quota, same as any credential the manager has never seen.
    pub fn load(mut credentials: Vec<Credential>, state_path: PathBuf) -> Self {
        let state = state::load(&state_path);

        for credential in credentials.iter_mut() {
            if let Some(entry) = state.credentials_status.get(credential.identity_key()) {
                credential.status = entry.status;
                credential.downloads_left = entry.downloads_left;
                credential.last_used = entry.last_used;
            }
        }

        let current_index = if credentials.is_empty() {
            0
        } else {
            state.current_index % credentials.len().max(1)
        };

        Self {
            credentials,
            current_index,
            state_path,
            document_extra: state.extra,
        }
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Result<&Credential> {
        self.credentials
            .get(self.current_index)
            .ok_or(CoreError::NoValidCredentials)
    }

    /// Validates every credential eagerly against the upstream probe,
    /// applying §4.3's outcome table with up to `VALIDATION_RETRY_ATTEMPTS`
    /// retries for network/transport errors.
    pub async fn validate_all(&mut self, upstream: &dyn UpstreamClient) -> Result<()> {
        for index in 0..self.credentials.len() {
            self.validate_one(index, upstream).await?;
        }
        if !self.credentials.iter().any(Credential::is_available) {
            return Err(CoreError::NoValidCredentials);
        }
        Ok(())
    }

    /// Validates a single credential lazily (on first use), never blocking
    /// startup for the rest of the set.
    pub async fn validate_lazy(&mut self, index: usize, upstream: &dyn UpstreamClient) -> Result<()> {
        self.validate_one(index, upstream).await
    }

    async fn validate_one(&mut self, index: usize, upstream: &dyn UpstreamClient) -> Result<()> {
        let mut attempts_left = VALIDATION_RETRY_ATTEMPTS + 1;
        let outcome = loop {
            let credential = &self.credentials[index];
            let outcome = upstream.probe(credential).await?;
            attempts_left -= 1;
            match &outcome {
                ProbeOutcome::NetworkError(_) if attempts_left > 0 => continue,
                _ => break outcome,
            }
        };

        let credential = &mut self.credentials[index];
        credential.last_validated = Some(Utc::now());
        match outcome {
            ProbeOutcome::Success { downloads_left } => {
                credential.status = CredentialStatus::Valid;
                if let Some(left) = downloads_left {
                    credential.downloads_left = left;
                }
            }
            ProbeOutcome::AuthRejected => {
                credential.status = CredentialStatus::Invalid;
            }
            ProbeOutcome::QuotaExhausted => {
                credential.status = CredentialStatus::Exhausted;
                credential.downloads_left = 0;
            }
            ProbeOutcome::NetworkError(_) => {
                credential.status = CredentialStatus::Unknown;
            }
        }
        self.flush_state()
    }

    /// Advances `current_index` to the next available credential, wrapping
    /// modulo the credential count. Fails with `AllCredentialsExhausted`
    /// without mutating `current_index` if no credential is available after
    /// a full wrap (§4.3, testable property 3).
    pub fn rotate(&mut self) -> Result<()> {
        let count = self.credentials.len();
        if count == 0 {
            return Err(CoreError::AllCredentialsExhausted);
        }
        for step in 1..=count {
            let candidate = (self.current_index + step) % count;
            if self.credentials[candidate].is_available() {
                self.current_index = candidate;
                self.flush_state()?;
                return Ok(());
            }
        }
        Err(CoreError::AllCredentialsExhausted)
    }

    /// Marks the current credential's status and flushes immediately
    /// (§4.3: "State is flushed after every rotation and every status
    /// transition").
    pub fn mark_current(&mut self, status: CredentialStatus) -> Result<()> {
        if let Some(credential) = self.credentials.get_mut(self.current_index) {
            credential.status = status;
            if status == CredentialStatus::Exhausted {
                credential.downloads_left = 0;
            }
        }
        self.flush_state()
    }

    /// §4.3's quota accounting: decrements the current credential's quota
    /// after a successful download, marking it EXHAUSTED at zero.
    pub fn record_successful_download(&mut self) -> Result<()> {
        if let Some(credential) = self.credentials.get_mut(self.current_index) {
            credential.last_used = Some(Utc::now());
            if credential.downloads_left > 0 {
                credential.downloads_left -= 1;
                if credential.downloads_left == 0 {
                    credential.status = CredentialStatus::Exhausted;
                }
            }
        }
        self.flush_state()
    }

    fn flush_state(&self) -> Result<()> {
        let mut credentials_status = std::collections::HashMap::new();
        for credential in &self.credentials {
            credentials_status.insert(
                credential.identity_key().to_string(),
                CredentialStatusEntry {
                    last_used: credential.last_used,
                    downloads_left: credential.downloads_left,
                    status: credential.status,
                    extra: serde_json::Map::new(),
                },
            );
        }
        let document = RotationStateFile {
            current_index: self.current_index,
            last_rotation: Some(Utc::now()),
            credentials_status,
            extra: self.document_extra.clone(),
        };
        state::save(&self.state_path, &document)
    }
}
