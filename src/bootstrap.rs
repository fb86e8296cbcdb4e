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

//! Bootstrap wiring (§10.3, §6.4).
//!
//! Constructs the core's components in the order the driver surface
//! requires: Credential Store → Credential Manager (with Rotation State) →
//! Session Pool → Orchestrator, and separately the catalog database. A
//! driver (the CLI shell, a TUI, or a test harness) owns the resulting
//! handles; this module performs no global/singleton state (§9 "Global
//! process state").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::Database;
use crate::credential::{load_credentials, CredentialManager};
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::session::SessionPool;
use crate::upstream::client::HttpUpstreamClient;
use crate::upstream::UpstreamClient;

const DEFAULT_STATE_FILENAME: &str = ".rotation-state.json";

pub struct Core {
    pub orchestrator: Orchestrator,
    pub database: Database,
}

pub struct BootstrapOptions {
    pub credentials_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub upstream_base_url: String,
}

/// Builds the full wiring described in §6.4 from explicit inputs only — no
/// environment access beyond what `load_credentials`/`Database::resolve_path`
/// already specify.
pub async fn bootstrap(options: BootstrapOptions) -> Result<Core> {
    let loaded = load_credentials(options.credentials_path.as_deref())?;

    let state_path = resolve_state_path(options.credentials_path.as_deref(), loaded.state_file.as_deref());
    let manager = CredentialManager::load(loaded.credentials, state_path);

    let upstream: Arc<dyn UpstreamClient> = Arc::new(HttpUpstreamClient::new(options.upstream_base_url)?);
    let session_pool = Arc::new(SessionPool::new(upstream.clone(), manager));
    session_pool.validate_all().await?;

    let db_path = Database::resolve_path(options.database_path.as_deref());
    let database = Database::new(&db_path).await?;

    let orchestrator = Orchestrator::new(session_pool, upstream, database.pool().clone());

    Ok(Core { orchestrator, database })
}

fn resolve_state_path(credentials_path: Option<&Path>, declared_state_file: Option<&str>) -> PathBuf {
    if let Some(name) = declared_state_file {
        let base = credentials_path
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| crate::catalog::database::home_dir().join(".zlibrary"));
        return base.join(name);
    }
    crate::catalog::database::home_dir().join(".zlibrary").join(DEFAULT_STATE_FILENAME)
}
