//! SQLite backend for the turn store and the event guard.
//!
//! One database file with two tables:
//! - `turns` — append-only conversation log; the AUTOINCREMENT rowid is
//!   both the turn id and the recency order.
//! - `processed_events` — one row per handled webhook event id; the
//!   primary-key constraint makes `check_and_mark` atomic, so two racing
//!   deliveries of the same event cannot both win.

use async_trait::async_trait;
use chrono::Utc;
use larkbridge_core::error::StoreError;
use larkbridge_core::store::{EventGuard, TurnStore};
use larkbridge_core::turn::{turn_size, SessionId, Turn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        // Append-only conversation log. The integer primary key is the
        // insertion sequence; AUTOINCREMENT prevents rowid reuse after
        // eviction, which would break recency ordering.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                question    TEXT NOT NULL,
                answer      TEXT NOT NULL,
                size        INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("session index: {e}")))?;

        // Uniqueness on event_id is what makes duplicate suppression safe
        // under concurrent redelivery.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                event_id TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("processed_events table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let question: String = row
            .try_get("question")
            .map_err(|e| StoreError::QueryFailed(format!("question column: {e}")))?;
        let answer: String = row
            .try_get("answer")
            .map_err(|e| StoreError::QueryFailed(format!("answer column: {e}")))?;
        let size: i64 = row
            .try_get("size")
            .map_err(|e| StoreError::QueryFailed(format!("size column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Turn {
            id,
            session_id: SessionId(session_id),
            question,
            answer,
            size,
            created_at,
        })
    }
}

#[async_trait]
impl TurnStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(
        &self,
        session_id: &SessionId,
        question: &str,
        answer: &str,
    ) -> Result<Turn, StoreError> {
        let size = turn_size(question, answer);
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO turns (session_id, question, answer, size, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session_id.as_str())
        .bind(question)
        .bind(answer)
        .bind(size)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT turn failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(session = %session_id, turn_id = id, size, "Stored turn");

        Ok(Turn {
            id,
            session_id: session_id.clone(),
            question: question.to_string(),
            answer: answer.to_string(),
            size,
            created_at,
        })
    }

    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query("SELECT * FROM turns WHERE session_id = ?1 ORDER BY id ASC")
            .bind(session_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session scan: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn list_by_session_desc(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query("SELECT * FROM turns WHERE session_id = ?1 ORDER BY id DESC")
            .bind(session_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session scan desc: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn delete_by_id(&self, turn_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM turns WHERE id = ?1")
            .bind(turn_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE turn failed: {e}")))?;
        Ok(())
    }

    async fn delete_all_for_session(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM turns WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE session failed: {e}")))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EventGuard for SqliteStore {
    async fn check_and_mark(&self, event_id: &str) -> Result<bool, StoreError> {
        // Single atomic statement: the insert either wins (first delivery)
        // or hits the primary key and affects zero rows (duplicate). No
        // application-level check-then-insert window.
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id) VALUES (?1) ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("event mark failed: {e}")))?;

        Ok(result.rows_affected() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn session(s: &str) -> SessionId {
        SessionId(s.to_string())
    }

    #[tokio::test]
    async fn append_and_list_in_order() {
        let db = test_store().await;
        let sid = session("c1u1");

        db.append(&sid, "first", "one").await.unwrap();
        db.append(&sid, "second", "two").await.unwrap();
        db.append(&sid, "third", "three").await.unwrap();

        let turns = db.list_by_session(&sid).await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].question, "first");
        assert_eq!(turns[2].question, "third");
        assert!(turns.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn append_computes_size() {
        let db = test_store().await;
        let turn = db.append(&session("s"), "hi", "hello").await.unwrap();
        assert_eq!(turn.size, 7);
    }

    #[tokio::test]
    async fn descending_order_is_newest_first() {
        let db = test_store().await;
        let sid = session("s");
        db.append(&sid, "old", "a").await.unwrap();
        db.append(&sid, "new", "b").await.unwrap();

        let turns = db.list_by_session_desc(&sid).await.unwrap();
        assert_eq!(turns[0].question, "new");
        assert_eq!(turns[1].question, "old");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let db = test_store().await;
        db.append(&session("a"), "q", "a").await.unwrap();
        db.append(&session("b"), "q", "a").await.unwrap();

        assert_eq!(db.list_by_session(&session("a")).await.unwrap().len(), 1);
        assert_eq!(db.list_by_session(&session("b")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_by_id_removes_exactly_one() {
        let db = test_store().await;
        let sid = session("s");
        let kept = db.append(&sid, "keep", "me").await.unwrap();
        let gone = db.append(&sid, "drop", "me").await.unwrap();

        db.delete_by_id(gone.id).await.unwrap();

        let turns = db.list_by_session(&sid).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].id, kept.id);
    }

    #[tokio::test]
    async fn delete_nonexistent_id_is_noop() {
        let db = test_store().await;
        assert!(db.delete_by_id(9999).await.is_ok());
    }

    #[tokio::test]
    async fn delete_all_for_session_returns_count() {
        let db = test_store().await;
        let sid = session("s");
        db.append(&sid, "q1", "a1").await.unwrap();
        db.append(&sid, "q2", "a2").await.unwrap();

        assert_eq!(db.delete_all_for_session(&sid).await.unwrap(), 2);
        assert_eq!(db.delete_all_for_session(&sid).await.unwrap(), 0);
        assert!(db.list_by_session(&sid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_not_reused_after_eviction() {
        let db = test_store().await;
        let sid = session("s");
        let first = db.append(&sid, "q1", "a1").await.unwrap();
        db.delete_by_id(first.id).await.unwrap();
        let second = db.append(&sid, "q2", "a2").await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn event_guard_first_delivery_then_duplicates() {
        let db = test_store().await;
        assert!(!db.check_and_mark("e1").await.unwrap());
        assert!(db.check_and_mark("e1").await.unwrap());
        assert!(db.check_and_mark("e1").await.unwrap());
    }

    #[tokio::test]
    async fn event_guard_ids_independent() {
        let db = test_store().await;
        assert!(!db.check_and_mark("e1").await.unwrap());
        assert!(!db.check_and_mark("e2").await.unwrap());
        assert!(db.check_and_mark("e1").await.unwrap());
        assert!(!db.check_and_mark("e3").await.unwrap());
        assert!(db.check_and_mark("e2").await.unwrap());
    }

    #[tokio::test]
    async fn event_guard_concurrent_same_id_single_winner() {
        let db = std::sync::Arc::new(test_store().await);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.check_and_mark("race").await.unwrap()
            }));
        }

        let mut first_deliveries = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                first_deliveries += 1;
            }
        }
        assert_eq!(first_deliveries, 1);
    }

    #[tokio::test]
    async fn backend_name() {
        let db = test_store().await;
        assert_eq!(TurnStore::name(&db), "sqlite");
    }
}
