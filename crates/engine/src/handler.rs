//! The per-event message pipeline.
//!
//! One `handle` call per webhook delivery: deduplicate, apply chat-type
//! rules, route commands, or run the conversational exchange (build prompt
//! → completion → append → evict → reply).
//!
//! Error policy at this boundary: every failure becomes a log entry plus a
//! best-effort user reply, and the reply never implies a side effect that
//! did not happen — a failed history clear is reported as a failure, not a
//! confirmation, and a failed append suppresses both eviction and the
//! answer reply.

use crate::commands::{Command, CLEAR_CONFIRMATION, HELP_TEXT};
use crate::context::ContextBuilder;
use crate::eviction::EvictionPolicy;
use larkbridge_core::completion::{CompletionEngine, CompletionRequest};
use larkbridge_core::error::{CompletionError, Error};
use larkbridge_core::event::{ChatKind, InboundEvent, MessageEvent};
use larkbridge_core::messenger::Messenger;
use larkbridge_core::store::{EventGuard, TurnStore};
use larkbridge_core::turn::SessionId;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reply for non-text messages.
pub const UNSUPPORTED_TYPE_REPLY: &str = "暂不支持其他类型的提问";

/// Reply when the completion API rate-limits us.
pub const RATE_LIMITED_REPLY: &str = "请求过于频繁，请稍后再试";

/// Reply for any other failure during an exchange.
pub const REQUEST_FAILED_REPLY: &str = "请求失败";

/// The mention token the platform embeds in group-message text.
const MENTION_TOKEN: &str = "@_user_1";

/// How an event left the pipeline, for the gateway's response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was sent (or at least attempted).
    Replied,
    /// Redelivery of an already-processed event; nothing was done.
    Duplicate,
    /// Not addressed to us (group chatter, unknown event shape).
    Ignored,
}

/// Text-message content payload: `{"text": "..."}`.
#[derive(Deserialize)]
struct TextContent {
    text: String,
}

/// The per-event pipeline over trait-object collaborators.
pub struct MessageHandler {
    store: Arc<dyn TurnStore>,
    guard: Arc<dyn EventGuard>,
    completion: Arc<dyn CompletionEngine>,
    messenger: Arc<dyn Messenger>,
    context: ContextBuilder,
    eviction: EvictionPolicy,
    bot_name: String,
    max_tokens: u32,
}

impl MessageHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn TurnStore>,
        guard: Arc<dyn EventGuard>,
        completion: Arc<dyn CompletionEngine>,
        messenger: Arc<dyn Messenger>,
        context: ContextBuilder,
        eviction: EvictionPolicy,
        bot_name: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            store,
            guard,
            completion,
            messenger,
            context,
            eviction,
            bot_name: bot_name.into(),
            max_tokens,
        }
    }

    /// Process one inbound event end to end.
    ///
    /// Only a failure of the event guard itself propagates (without the
    /// guard we cannot safely touch anything); every later failure is
    /// absorbed into a best-effort reply.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Outcome, Error> {
        // The mark is written before any side effect, so a redelivery that
        // races this request resolves to exactly one processing.
        if self.guard.check_and_mark(&event.event_id).await? {
            info!(event_id = %event.event_id, "Duplicate event, skipping");
            return Ok(Outcome::Duplicate);
        }

        let Some(msg) = &event.message else {
            debug!(event_type = %event.event_type, "Event without message payload, ignoring");
            return Ok(Outcome::Ignored);
        };

        if msg.chat_type == ChatKind::Group {
            // Group chatter without a mention is everyday conversation,
            // and mentions of someone else are not for us either.
            let Some(first) = msg.mentions.first() else {
                debug!(chat = %msg.chat_id, "Group message without mention, ignoring");
                return Ok(Outcome::Ignored);
            };
            if first.name != self.bot_name {
                debug!(mentioned = %first.name, "First mention is not this bot, ignoring");
                return Ok(Outcome::Ignored);
            }
        }

        if msg.message_type != "text" {
            info!(message_type = %msg.message_type, "Unsupported message type");
            self.send_reply(&msg.message_id, UNSUPPORTED_TYPE_REPLY).await;
            return Ok(Outcome::Replied);
        }

        let Some(text) = extract_text(&msg.content) else {
            warn!(message_id = %msg.message_id, "Unparseable text content payload");
            self.send_reply(&msg.message_id, UNSUPPORTED_TYPE_REPLY).await;
            return Ok(Outcome::Replied);
        };

        let question = strip_mention(&text);
        let question = question.trim();
        let session_id = SessionId::derive(&msg.chat_id, &msg.sender_id);

        if let Some(command) = Command::parse(question) {
            self.run_command(command, &session_id, &msg.message_id).await;
            return Ok(Outcome::Replied);
        }

        self.run_exchange(&session_id, question, msg).await;
        Ok(Outcome::Replied)
    }

    async fn run_command(&self, command: Command, session_id: &SessionId, message_id: &str) {
        match command {
            Command::Help => {
                self.send_reply(message_id, HELP_TEXT).await;
            }
            Command::Clear => match self.store.delete_all_for_session(session_id).await {
                Ok(removed) => {
                    info!(session = %session_id, removed, "History cleared");
                    self.send_reply(message_id, CLEAR_CONFIRMATION).await;
                }
                Err(e) => {
                    error!(session = %session_id, error = %e, "History clear failed");
                    self.send_reply(message_id, REQUEST_FAILED_REPLY).await;
                }
            },
        }
    }

    async fn run_exchange(&self, session_id: &SessionId, question: &str, msg: &MessageEvent) {
        let prompt = match self.context.build(session_id, question).await {
            Ok(p) => p,
            Err(e) => {
                error!(session = %session_id, error = %e, "Prompt assembly failed");
                self.send_reply(&msg.message_id, REQUEST_FAILED_REPLY).await;
                return;
            }
        };

        debug!(session = %session_id, prompt_len = prompt.len(), "Requesting completion");

        let answer = match self
            .completion
            .complete(CompletionRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .await
        {
            Ok(answer) => answer,
            Err(CompletionError::RateLimited) => {
                warn!(session = %session_id, "Completion API rate limited");
                self.send_reply(&msg.message_id, RATE_LIMITED_REPLY).await;
                return;
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "Completion failed");
                self.send_reply(&msg.message_id, REQUEST_FAILED_REPLY).await;
                return;
            }
        };

        match self.store.append(session_id, question, &answer).await {
            Ok(_) => {
                // Trim only after a successful append; failures inside the
                // trim are already logged and retried on the next append.
                if let Err(e) = self.eviction.trim(self.store.as_ref(), session_id).await {
                    warn!(session = %session_id, error = %e, "Eviction pass failed");
                }
                self.send_reply(&msg.message_id, &answer).await;
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "Turn append failed");
                self.send_reply(&msg.message_id, REQUEST_FAILED_REPLY).await;
            }
        }
    }

    /// Delivery failures are logged, never retried: the platform will
    /// redeliver the event on its own and the guard makes that a no-op.
    async fn send_reply(&self, message_id: &str, text: &str) {
        if let Err(e) = self.messenger.reply(message_id, text).await {
            error!(message_id = %message_id, error = %e, "Reply delivery failed");
        }
    }
}

/// Pull the text out of the platform's `{"text": ...}` content payload.
fn extract_text(content: &str) -> Option<String> {
    serde_json::from_str::<TextContent>(content)
        .ok()
        .map(|c| c.text)
}

/// Strip the platform mention token (first occurrence only, matching how
/// the platform injects exactly one token per mention entry).
fn strip_mention(text: &str) -> String {
    text.replacen(MENTION_TOKEN, "", 1)
}
