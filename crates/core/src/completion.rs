//! CompletionEngine trait — the abstraction over the text-completion API.

use crate::error::CompletionError;
use async_trait::async_trait;

/// A prompt-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The fully assembled prompt (preamble + history + new question).
    pub prompt: String,

    /// Maximum tokens the engine may generate.
    pub max_tokens: u32,
}

/// The completion engine contract.
///
/// Implementations own their HTTP client and timeouts; no call may block
/// indefinitely. Rate limiting surfaces as its own error variant so the
/// handler can show the user a "try again later" message.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Engine name for logs ("openai", "mock").
    fn name(&self) -> &str;

    /// Generate text for the given prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}
