//! In-memory backend — useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use larkbridge_core::error::StoreError;
use larkbridge_core::store::{EventGuard, TurnStore};
use larkbridge_core::turn::{turn_size, SessionId, Turn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// An in-memory store keeping turns in a Vec and event ids in a HashSet.
///
/// The id counter is atomic and the collections sit behind `RwLock`s, so
/// concurrent handlers get the same guarantees as the SQLite backend:
/// whole-turn writes and single-winner event marking.
pub struct InMemoryStore {
    turns: RwLock<Vec<Turn>>,
    events: RwLock<HashSet<String>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            events: RwLock::new(HashSet::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(
        &self,
        session_id: &SessionId,
        question: &str,
        answer: &str,
    ) -> Result<Turn, StoreError> {
        let turn = Turn {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            session_id: session_id.clone(),
            question: question.to_string(),
            answer: answer.to_string(),
            size: turn_size(question, answer),
            created_at: Utc::now(),
        };
        self.turns.write().await.push(turn.clone());
        Ok(turn)
    }

    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Turn>, StoreError> {
        let turns = self.turns.read().await;
        let mut result: Vec<Turn> = turns
            .iter()
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .collect();
        result.sort_by_key(|t| t.id);
        Ok(result)
    }

    async fn list_by_session_desc(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Turn>, StoreError> {
        let mut result = self.list_by_session(session_id).await?;
        result.reverse();
        Ok(result)
    }

    async fn delete_by_id(&self, turn_id: i64) -> Result<(), StoreError> {
        self.turns.write().await.retain(|t| t.id != turn_id);
        Ok(())
    }

    async fn delete_all_for_session(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let mut turns = self.turns.write().await;
        let len_before = turns.len();
        turns.retain(|t| t.session_id != *session_id);
        Ok((len_before - turns.len()) as u64)
    }
}

#[async_trait]
impl EventGuard for InMemoryStore {
    async fn check_and_mark(&self, event_id: &str) -> Result<bool, StoreError> {
        // The write lock spans check and insert, so the same-id race
        // resolves to exactly one first delivery.
        let mut events = self.events.write().await;
        Ok(!events.insert(event_id.to_string()))
    }
}
