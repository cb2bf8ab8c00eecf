//! Command Router — the slash-command surface.
//!
//! Stateless between invocations; the only persistent effect a command can
//! have goes through the turn store. Unknown or malformed commands fall
//! back to help, so every command branch ends in a reply.

/// Static usage text sent for `/help` and for any unrecognized command.
pub const HELP_TEXT: &str = "ChatGPT 指令使用指南

Usage:
    /clear    清除上下文
    /help     获取更多帮助
  ";

/// Confirmation sent after a successful `/clear`.
pub const CLEAR_CONFIRMATION: &str = "✅记忆已清除";

/// A recognized slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Clear,
}

impl Command {
    /// Classify normalized, trimmed input.
    ///
    /// Returns `None` for conversational turns (no leading `/`). Any
    /// leading-`/` token other than the two known commands routes to
    /// `Help` — never an error.
    pub fn parse(input: &str) -> Option<Command> {
        if !input.starts_with('/') {
            return None;
        }
        match input {
            "/clear" => Some(Command::Clear),
            _ => Some(Command::Help),
        }
    }
}
