//! Storage traits — the turn store and the event guard.
//!
//! Both are the only shared mutable resources in the system. Correctness
//! under concurrent webhook deliveries is pushed into the storage layer
//! (unique constraints, atomic inserts) rather than application-level
//! mutexes, so implementations must support concurrent readers and writers
//! without caller-side locking.

use crate::error::StoreError;
use crate::turn::{SessionId, Turn};
use async_trait::async_trait;

/// Durable append-only log of question/answer pairs keyed by session.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Backend name for logs ("sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Compute the size metric, assign an id ordered after all currently
    /// stored turns for the session, and persist the record.
    ///
    /// A persistence failure propagates; the caller must not run eviction
    /// or send replies that imply the write succeeded.
    async fn append(
        &self,
        session_id: &SessionId,
        question: &str,
        answer: &str,
    ) -> Result<Turn, StoreError>;

    /// All turns for a session, oldest first. Used by the context builder.
    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Turn>, StoreError>;

    /// All turns for a session, newest first. Used by the eviction policy.
    async fn list_by_session_desc(&self, session_id: &SessionId)
    -> Result<Vec<Turn>, StoreError>;

    /// Delete one turn by id. Idempotent: a nonexistent id is a no-op.
    async fn delete_by_id(&self, turn_id: i64) -> Result<(), StoreError>;

    /// Delete every turn for a session; returns the count removed.
    async fn delete_all_for_session(&self, session_id: &SessionId) -> Result<u64, StoreError>;
}

/// Deduplicates inbound platform events by event id.
#[async_trait]
pub trait EventGuard: Send + Sync {
    /// Returns `true` if the event was already processed (duplicate
    /// delivery — caller must stop and acknowledge as a no-op), or marks it
    /// processed and returns `false` (first delivery — caller proceeds).
    ///
    /// The mark must be written before any side effect, and the
    /// check-then-insert must be atomic for a given id: two racing
    /// deliveries of the same id must not both observe "first delivery".
    async fn check_and_mark(&self, event_id: &str) -> Result<bool, StoreError>;
}
