//! Turn — one question/answer exchange belonging to a session.
//!
//! Turns are append-only: once created they are never mutated, and the
//! sequence of a session's surviving turns, ordered by insertion, is exactly
//! the history that was presented to the completion engine when each answer
//! was produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation scope, keyed by chat + sender identity.
///
/// There is no standalone session record; the id is purely a grouping key
/// over turns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Derive the session key the way the platform handler does:
    /// chat id concatenated with sender id.
    pub fn derive(chat_id: &str, sender_id: &str) -> Self {
        Self(format!("{chat_id}{sender_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One stored question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Store-assigned id, stable for the turn's lifetime. The log is
    /// append-only, so ids double as the monotonic insertion sequence and
    /// define recency ordering.
    pub id: i64,

    /// Grouping key, not unique.
    pub session_id: SessionId,

    /// The user's normalized input (mention tokens stripped).
    pub question: String,

    /// The completion engine's response.
    pub answer: String,

    /// Eviction cost metric: character count of question + answer.
    /// A proxy for token count, not real tokenization.
    pub size: i64,

    /// Wall-clock insert time. Ordering is authoritative on `id`; this is
    /// carried for logs and debugging.
    pub created_at: DateTime<Utc>,
}

/// Compute the size metric for a prospective turn.
///
/// Unicode scalar count, not bytes, so multi-byte scripts are not
/// over-weighted relative to the character-count budget.
pub fn turn_size(question: &str, answer: &str) -> i64 {
    (question.chars().count() + answer.chars().count()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_derivation_concatenates() {
        let id = SessionId::derive("c1", "u1");
        assert_eq!(id.as_str(), "c1u1");
    }

    #[test]
    fn size_counts_characters_not_bytes() {
        assert_eq!(turn_size("hi", "hello"), 7);
        // "你好" is 6 bytes but 2 characters
        assert_eq!(turn_size("你好", ""), 2);
    }

    #[test]
    fn size_of_empty_exchange_is_zero() {
        assert_eq!(turn_size("", ""), 0);
    }
}
