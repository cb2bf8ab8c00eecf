//! Context Builder — assembles the completion prompt for a session.
//!
//! Prompt shape: one preamble, then every surviving turn oldest-first as a
//! fixed two-line block, then the new unanswered question:
//!
//! ```text
//! <preamble>
//! Q: <question>
//! A: <answer>
//!
//! Q: <new question>
//! A:
//! ```
//!
//! No truncation happens here. Budget enforcement belongs to the eviction
//! policy and was applied after the *previous* exchange, so the prompt
//! reflects the store as of the last trim — the current question may push
//! the next prompt over budget until eviction runs again.

use crate::classify::PreambleClassifier;
use larkbridge_core::error::StoreError;
use larkbridge_core::store::TurnStore;
use larkbridge_core::turn::SessionId;
use std::sync::Arc;

/// Builds prompts from stored history plus the new question.
pub struct ContextBuilder {
    store: Arc<dyn TurnStore>,
    classifier: Arc<dyn PreambleClassifier>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn TurnStore>, classifier: Arc<dyn PreambleClassifier>) -> Self {
        Self { store, classifier }
    }

    /// Assemble the prompt for `question` in `session_id`.
    pub async fn build(
        &self,
        session_id: &SessionId,
        question: &str,
    ) -> Result<String, StoreError> {
        let mut prompt = self.classifier.classify(question).preamble().to_string();

        for turn in self.store.list_by_session(session_id).await? {
            prompt.push_str("Q: ");
            prompt.push_str(&turn.question);
            prompt.push_str("\nA: ");
            prompt.push_str(&turn.answer);
            prompt.push_str("\n\n");
        }

        prompt.push_str("Q: ");
        prompt.push_str(question);
        prompt.push_str("\nA: ");
        Ok(prompt)
    }
}
