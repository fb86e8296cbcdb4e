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

//! Embedded relational store connection management (§6.3).
//!
//! Adapted from the same connection/pragma/vacuum pattern used throughout
//! this corpus for sqlx-backed SQLite stores: WAL journal mode, foreign keys
//! on, a single pool with a bounded connection count, and runtime migrations
//! tracked in an `_migrations` table rather than compile-time `migrate!`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;

use crate::error::{CoreError, Result};

pub const DB_PATH_ENV: &str = "ZLIBRARY_DB_PATH";

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_string = format!("sqlite://{}?mode=rwc", path.display());
        let connect_opts = SqliteConnectOptions::from_str(&connection_string)
            .map_err(CoreError::from_sqlx)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        Self::configure(&pool).await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(CoreError::from_sqlx)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;

        Self::configure(&pool).await?;

        let db = Self { pool, path: None };
        db.migrate().await?;
        Ok(db)
    }

    async fn configure(pool: &SqlitePool) -> Result<()> {
        sqlx::query("PRAGMA auto_vacuum = INCREMENTAL")
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn migrate(&self) -> Result<()> {
        crate::catalog::migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Resolves the default catalog path, honoring `ZLIBRARY_DB_PATH` first
    /// and falling back to `~/.zlibrary/books.db` (§6.3).
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            return PathBuf::from(path);
        }
        home_dir().join(".zlibrary").join("books.db")
    }

    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn incremental_vacuum(&self, pages: i32) -> Result<()> {
        let query = if pages > 0 {
            format!("PRAGMA incremental_vacuum({pages})")
        } else {
            "PRAGMA incremental_vacuum".to_string()
        };
        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn file_size_bytes(&self) -> Result<u64> {
        match &self.path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }

    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count").fetch_one(&self.pool).await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size").fetch_one(&self.pool).await?;
        let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            page_count: page_count as u64,
            page_size: page_size as u64,
            freelist_count: freelist_count as u64,
            total_size: (page_count * page_size) as u64,
            unused_size: (freelist_count * page_size) as u64,
        })
    }

    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await?;
        Ok(())
    }

    /// Backs up the catalog to `output_path`: checkpoints the WAL so the
    /// main database file is self-contained, then copies it.
    pub async fn export_file<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let source_path = self
            .path
            .as_ref()
            .ok_or_else(|| CoreError::catalog("cannot back up an in-memory database"))?;
        self.checkpoint().await?;
        std::fs::copy(source_path, output_path.as_ref())?;
        Ok(())
    }

    /// Restores a catalog previously written by [`Database::export_file`]:
    /// closes this connection, copies `backup_path` over this database's
    /// file, and reopens a fresh pool against it.
    pub async fn restore_file<P: AsRef<Path>>(self, backup_path: P) -> Result<Self> {
        let destination = self
            .path
            .clone()
            .ok_or_else(|| CoreError::catalog("cannot restore into an in-memory database"))?;
        self.close().await;
        std::fs::copy(backup_path.as_ref(), &destination)?;
        Self::new(&destination).await
    }

    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check").fetch_one(&self.pool).await?;
        Ok(result == "ok")
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub page_count: u64,
    pub page_size: u64,
    pub freelist_count: u64,
    pub total_size: u64,
    pub unused_size: u64,
}

impl DatabaseStats {
    pub fn unused_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.unused_size as f64 / self.total_size as f64) * 100.0
        }
    }

    pub fn should_vacuum(&self) -> bool {
        self.unused_percentage() > 20.0
    }
}

/// Platform-appropriate home directory, used both for the default catalog
/// path (§6.3) and the default credential file path (§4.1).
pub fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_is_queryable() {
        let db = Database::new_in_memory().await.unwrap();
        let result: i64 = sqlx::query_scalar("SELECT 1").fetch_one(db.pool()).await.unwrap();
        assert_eq!(result, 1);
    }

    #[tokio::test]
    async fn stats_report_nonzero_page_size() {
        let db = Database::new_in_memory().await.unwrap();
        let stats = db.get_stats().await.unwrap();
        assert!(stats.page_size > 0);
    }

    #[tokio::test]
    async fn integrity_check_passes_on_fresh_database() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(db.check_integrity().await.unwrap());
    }

    #[test]
    fn resolve_path_prefers_explicit_then_env_then_default() {
        std::env::remove_var(DB_PATH_ENV);
        let explicit = PathBuf::from("/tmp/explicit.db");
        assert_eq!(Database::resolve_path(Some(&explicit)), explicit);

        std::env::set_var(DB_PATH_ENV, "/tmp/from-env.db");
        assert_eq!(Database::resolve_path(None), PathBuf::from("/tmp/from-env.db"));
        std::env::remove_var(DB_PATH_ENV);
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips_book_count() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("books.db");
        let backup_path = dir.path().join("books.backup.db");

        let db = Database::new(&db_path).await.unwrap();
        sqlx::query(
            "INSERT INTO books (id, hash, title, created_at, updated_at) VALUES ('a', 'h', 'T', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.export_file(&backup_path).await.unwrap();

        sqlx::query("DELETE FROM books").execute(db.pool()).await.unwrap();
        let restored = db.restore_file(&backup_path).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books").fetch_one(restored.pool()).await.unwrap();
        assert_eq!(count, 1);
    }
}
