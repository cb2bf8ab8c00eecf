//! The larkbridge conversation engine.
//!
//! Everything between "a deduplicated inbound event" and "a reply handed to
//! the messenger" lives here:
//! - `classify` — preamble selection heuristic behind a pluggable trait
//! - `context` — prompt assembly from stored history
//! - `eviction` — size-bounded history trimming
//! - `commands` — the `/help` and `/clear` slash-command surface
//! - `handler` — the per-event pipeline tying it all together

pub mod classify;
pub mod commands;
pub mod context;
pub mod eviction;
pub mod handler;

pub use classify::{FirstCharClassifier, Language, PreambleClassifier};
pub use commands::Command;
pub use context::ContextBuilder;
pub use eviction::EvictionPolicy;
pub use handler::{MessageHandler, Outcome};
