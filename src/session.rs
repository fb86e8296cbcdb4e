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

//! Session Pool (C4, §4.4).
//!
//! Caches one authenticated upstream session per credential identity. The
//! pool is logically single-consumer (§5); its map and the credential
//! manager's cursor are each protected by one lock, matching the
//! single-active-operation scheduling model instead of a general-purpose
//! concurrent cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::credential::CredentialManager;
use crate::error::{CoreError, Result};
use crate::upstream::{Session, UpstreamClient};

pub struct SessionPool {
    upstream: Arc<dyn UpstreamClient>,
    manager: Mutex<CredentialManager>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionPool {
    pub fn new(upstream: Arc<dyn UpstreamClient>, manager: CredentialManager) -> Self {
        Self {
            upstream,
            manager: Mutex::new(manager),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn validate_all(&self) -> Result<()> {
        let mut manager = self.manager.lock().await;
        manager.validate_all(self.upstream.as_ref()).await
    }

    /// Returns the session for the manager's current credential, creating it
    /// lazily on first use. Session-creation failure surfaces as
    /// `UpstreamAuth`/`UpstreamTransient` for the caller (C5) to act on.
    pub async fn get_current(&self) -> Result<Session> {
        let identity_key = {
            let manager = self.manager.lock().await;
            manager.current()?.identity_key().to_string()
        };

        {
            let sessions = self.sessions.lock().await;
            if let Some(session) = sessions.get(&identity_key) {
                return Ok(session.clone());
            }
        }

        let credential = {
            let manager = self.manager.lock().await;
            manager.current()?.clone()
        };
        let session = self.upstream.authenticate(&credential).await?;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(identity_key, session.clone());
        Ok(session)
    }

    /// Rotates the underlying manager, then returns the new current session.
    pub async fn rotate(&self) -> Result<Session> {
        {
            let mut manager = self.manager.lock().await;
            manager.rotate()?;
        }
        self.get_current().await
    }

    /// Discards and recreates the session for `identity_key` (used after an
    /// upstream auth error mid-operation).
    pub async fn refresh(&self, identity_key: &str) -> Result<Session> {
        {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(identity_key);
        }
        let credential = {
            let manager = self.manager.lock().await;
            manager
                .credentials()
                .iter()
                .find(|c| c.identity_key() == identity_key)
                .cloned()
                .ok_or_else(|| CoreError::not_found(format!("credential '{identity_key}'")))?
        };
        let session = self.upstream.authenticate(&credential).await?;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(identity_key.to_string(), session.clone());
        Ok(session)
    }

    pub async fn mark_current_invalid(&self) -> Result<()> {
        let mut manager = self.manager.lock().await;
        manager.mark_current(crate::credential::CredentialStatus::Invalid)
    }

    pub async fn mark_current_exhausted(&self) -> Result<()> {
        let mut manager = self.manager.lock().await;
        manager.mark_current(crate::credential::CredentialStatus::Exhausted)
    }

    pub async fn record_successful_download(&self) -> Result<()> {
        let mut manager = self.manager.lock().await;
        manager.record_successful_download()
    }

    pub async fn current_identity_key(&self) -> Result<String> {
        let manager = self.manager.lock().await;
        Ok(manager.current()?.identity_key().to_string())
    }

    pub async fn current_downloads_left(&self) -> Result<i64> {
        let manager = self.manager.lock().await;
        Ok(manager.current()?.downloads_left)
    }

    pub async fn credential_count(&self) -> usize {
        self.manager.lock().await.credentials().len()
    }
}
