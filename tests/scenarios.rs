//! End-to-end scenario tests (§8, S1-S4 and S6) driven against a stub
//! `UpstreamClient` instead of the real HTTP implementation. S5 (malformed
//! import aborts atomically) is covered as a catalog-service unit test
//! alongside `import_json`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use zlibrary_core::catalog::repository;
use zlibrary_core::catalog::Database;
use zlibrary_core::credential::model::{AuthShape, Credential, CredentialStatus};
use zlibrary_core::credential::CredentialManager;
use zlibrary_core::error::{CoreError, Result};
use zlibrary_core::orchestrator::{Orchestrator, SearchOptions};
use zlibrary_core::session::SessionPool;
use zlibrary_core::upstream::{BookRecord, DownloadPayload, ProbeOutcome, SearchFilters, Session, UpstreamClient};

fn credential(identity: &str, status: CredentialStatus, downloads_left: i64) -> Credential {
    let mut c = Credential::new(
        None,
        AuthShape::Password { email: identity.to_string(), password: "pw".to_string() },
        true,
    );
    c.status = status;
    c.downloads_left = downloads_left;
    c
}

fn book(id: &str, hash: &str, title: &str, author: &str) -> BookRecord {
    BookRecord {
        id: id.to_string(),
        hash: hash.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        year: None,
        publisher: None,
        language: None,
        extension: None,
        filesize_human: None,
        filesize_bytes: None,
        cover_url: None,
        description: None,
        isbn: None,
        edition: None,
        pages: None,
    }
}

/// Records which credential issued each search call and returns scripted
/// outcomes in order, one per call; an outcome may carry an artificial
/// delay so a caller can cancel while the call is "in flight".
#[derive(Default)]
struct StubUpstream {
    search_calls: StdMutex<Vec<String>>,
    search_outcomes: StdMutex<VecDeque<(Result<Vec<BookRecord>>, Option<Duration>)>>,
    download_outcomes: StdMutex<VecDeque<Result<DownloadPayload>>>,
}

impl StubUpstream {
    fn push_search(&self, outcome: Result<Vec<BookRecord>>) {
        self.search_outcomes.lock().unwrap().push_back((outcome, None));
    }

    fn push_search_delayed(&self, outcome: Result<Vec<BookRecord>>, delay: Duration) {
        self.search_outcomes.lock().unwrap().push_back((outcome, Some(delay)));
    }

    fn push_download(&self, outcome: Result<DownloadPayload>) {
        self.download_outcomes.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl UpstreamClient for StubUpstream {
    async fn probe(&self, _credential: &Credential) -> Result<ProbeOutcome> {
        Ok(ProbeOutcome::Success { downloads_left: None })
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Session> {
        Ok(Session { identity_key: credential.identity_key().to_string(), created_at: Utc::now() })
    }

    async fn search(&self, session: &Session, _query: &str, _filters: &SearchFilters) -> Result<Vec<BookRecord>> {
        self.search_calls.lock().unwrap().push(session.identity_key.clone());
        let next = self.search_outcomes.lock().unwrap().pop_front();
        match next {
            Some((outcome, Some(delay))) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Some((outcome, None)) => outcome,
            None => Ok(Vec::new()),
        }
    }

    async fn download(&self, _session: &Session, _book: &BookRecord) -> Result<DownloadPayload> {
        self.download_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::upstream_transient("no outcome scripted")))
    }
}

async fn build(credentials: Vec<Credential>, upstream: Arc<StubUpstream>) -> (Orchestrator, Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = CredentialManager::load(credentials, dir.path().join("state.json"));
    let pool = Arc::new(SessionPool::new(upstream.clone(), manager));
    let db = Database::new_in_memory().await.unwrap();
    let orchestrator = Orchestrator::new(pool, upstream, db.pool().clone());
    (orchestrator, db, dir)
}

#[tokio::test]
async fn s1_search_and_store_ingests_books_and_shared_author() {
    let upstream = Arc::new(StubUpstream::default());
    upstream.push_search(Ok(vec![book("A", "h", "T1", "X, Y"), book("B", "h2", "T2", "X")]));

    let (orchestrator, db, _dir) = build(vec![credential("c1", CredentialStatus::Valid, -1)], upstream).await;
    let cancel = CancellationToken::new();
    let options = SearchOptions { save_to_catalog: true };
    let results = orchestrator.search("q", &SearchFilters::default(), &options, &cancel).await.unwrap();
    assert_eq!(results.len(), 2);

    assert_eq!(repository::count_books(db.pool()).await.unwrap(), 2);

    let authors: Vec<String> = sqlx::query_scalar("SELECT name FROM authors ORDER BY name")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(authors, vec!["X".to_string(), "Y".to_string()]);

    let links: Vec<(String, i64, String)> = sqlx::query_as(
        "SELECT book_authors.book_id, book_authors.position, authors.name \
         FROM book_authors JOIN authors ON authors.id = book_authors.author_id \
         ORDER BY book_authors.book_id, book_authors.position",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert_eq!(
        links,
        vec![
            ("A".to_string(), 0, "X".to_string()),
            ("A".to_string(), 1, "Y".to_string()),
            ("B".to_string(), 0, "X".to_string()),
        ]
    );

    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_history WHERE raw_query = 'q'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(history_count, 1);
}

#[tokio::test]
async fn s2_rotation_over_three_credentials_one_exhausted() {
    let upstream = Arc::new(StubUpstream::default());
    for _ in 0..3 {
        upstream.push_search(Ok(Vec::new()));
    }

    let credentials = vec![
        credential("c1", CredentialStatus::Valid, -1),
        credential("c2", CredentialStatus::Exhausted, 0),
        credential("c3", CredentialStatus::Valid, -1),
    ];
    let (orchestrator, _db, _dir) = build(credentials, upstream.clone()).await;
    let cancel = CancellationToken::new();
    let options = SearchOptions { save_to_catalog: false };

    for _ in 0..3 {
        orchestrator.search("q", &SearchFilters::default(), &options, &cancel).await.unwrap();
    }

    let used = upstream.search_calls.lock().unwrap().clone();
    assert_eq!(used, vec!["c1".to_string(), "c3".to_string(), "c1".to_string()]);
}

#[tokio::test]
async fn s3_download_failure_does_not_decrement_quota() {
    let upstream = Arc::new(StubUpstream::default());
    upstream.push_download(Err(CoreError::upstream_transient("payload fetch failed")));

    let (orchestrator, db, _dir) = build(vec![credential("c1", CredentialStatus::Valid, 5)], upstream).await;
    let dest = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let err = orchestrator.download(&book("B", "h", "T", "A"), dest.path(), &cancel).await.unwrap_err();
    assert!(matches!(err, CoreError::UpstreamTransient(_)));

    let downloads = repository::list_recent_downloads(db.pool(), 10).await.unwrap();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].status, "failed");
    assert!(downloads[0].error_message.is_some());
}

#[tokio::test]
async fn s4_all_exhausted_download_fails_without_recording() {
    let upstream = Arc::new(StubUpstream::default());
    let credentials = vec![
        credential("c1", CredentialStatus::Exhausted, 0),
        credential("c2", CredentialStatus::Exhausted, 0),
    ];
    let (orchestrator, db, _dir) = build(credentials, upstream).await;
    let dest = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();

    let err = orchestrator.download(&book("B", "h", "T", "A"), dest.path(), &cancel).await.unwrap_err();
    assert!(matches!(err, CoreError::AllCredentialsExhausted));

    let downloads = repository::list_recent_downloads(db.pool(), 10).await.unwrap();
    assert!(downloads.is_empty());
}

#[tokio::test]
async fn s6_cancel_mid_search_keeps_first_page_drops_second() {
    let upstream = Arc::new(StubUpstream::default());
    // Page 1: exactly `limit` results, so the loop goes on to request page 2.
    upstream.push_search(Ok(vec![book("A", "h1", "T1", "X"), book("B", "h2", "T2", "Y")]));
    // Page 2's call hangs; the cancellation fires while it is suspended.
    upstream.push_search_delayed(Ok(Vec::new()), Duration::from_millis(200));

    let (orchestrator, db, _dir) = build(vec![credential("c1", CredentialStatus::Valid, -1)], upstream).await;
    let cancel = CancellationToken::new();
    let options = SearchOptions { save_to_catalog: true };
    let filters = SearchFilters { limit: 2, ..Default::default() };

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_clone.cancel();
    });

    let err = orchestrator.search_all_pages("q", &filters, &options, &cancel).await.unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));

    assert_eq!(repository::count_books(db.pool()).await.unwrap(), 2);
}
