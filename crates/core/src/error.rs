//! Error types for the larkbridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! A duplicate webhook delivery is deliberately *not* an error: the event
//! guard reports it as a boolean outcome and the handler turns it into a
//! no-op acknowledgment.

use thiserror::Error;

/// The top-level error type for all larkbridge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Completion engine errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Messenger errors ---
    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Persistence failures from the turn store or the event guard.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Failures from the text-completion API.
///
/// Rate limiting is distinguished from everything else because it maps to a
/// different user-visible reply ("try again later" vs. a generic failure).
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Rate limited by completion API")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures from the messaging platform client.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Authentication with platform failed: {0}")]
    Auth(String),

    #[error("Message delivery failed for {message_id}: {reason}")]
    DeliveryFailed { message_id: String, reason: String },

    #[error("Invalid platform payload: {0}")]
    InvalidPayload(String),

    #[error("Network error: {0}")]
    Network(String),
}
