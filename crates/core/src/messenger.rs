//! Messenger trait — the abstraction over the messaging platform's
//! outbound side.

use crate::error::MessengerError;
use async_trait::async_trait;

/// Delivers replies back to the messaging platform.
///
/// Delivery failures are logged by callers and never retried; the platform
/// redelivers the triggering event instead, and the event guard turns that
/// redelivery into a no-op.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Reply to a specific platform message with plain text.
    async fn reply(&self, message_id: &str, text: &str) -> Result<(), MessengerError>;
}
