//! Eviction Policy — keeps per-session prompt cost bounded without
//! discarding the most recent context.
//!
//! Walking the session newest-first, a running total of turn sizes is
//! accumulated; a turn survives while the total including it stays within
//! budget. The first turn to push the total strictly over budget is
//! evicted together with everything older than it — the boundary turn is
//! sacrificed whole, never partially kept. The comparison is strict
//! (`> budget`, not `>=`): it decides which single turn dies at the
//! boundary and must not be changed.
//!
//! Cleanup is best-effort, not transactional: each flagged turn is deleted
//! independently, a failed delete is logged and skipped, and any turns left
//! over-budget are retried by the eviction run after the next append.

use larkbridge_core::error::StoreError;
use larkbridge_core::store::TurnStore;
use larkbridge_core::turn::{SessionId, Turn};
use tracing::{debug, warn};

/// The size-bounded eviction policy for one configured budget.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    budget: i64,
}

impl EvictionPolicy {
    pub fn new(budget: i64) -> Self {
        Self { budget }
    }

    /// Flag the turn ids to evict, given the session's turns newest-first.
    ///
    /// Pure function: the running total includes every turn walked so far,
    /// so once one turn exceeds the budget all older turns do too.
    pub fn flag(&self, newest_first: &[Turn]) -> Vec<i64> {
        let mut total = 0i64;
        let mut flagged = Vec::new();
        for turn in newest_first {
            total += turn.size;
            if total > self.budget {
                flagged.push(turn.id);
            }
        }
        flagged
    }

    /// Trim one session: fetch newest-first, flag, delete each flagged turn.
    ///
    /// Invoked synchronously after every successful append. Individual
    /// delete failures do not abort the pass.
    pub async fn trim(
        &self,
        store: &dyn TurnStore,
        session_id: &SessionId,
    ) -> Result<(), StoreError> {
        let turns = store.list_by_session_desc(session_id).await?;
        let flagged = self.flag(&turns);
        if flagged.is_empty() {
            return Ok(());
        }

        debug!(
            session = %session_id,
            count = flagged.len(),
            budget = self.budget,
            "Evicting over-budget turns"
        );

        for turn_id in flagged {
            if let Err(e) = store.delete_by_id(turn_id).await {
                warn!(turn_id, error = %e, "Turn eviction failed, skipping");
            }
        }
        Ok(())
    }
}
