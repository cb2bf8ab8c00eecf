//! # larkbridge Core
//!
//! Domain types, traits, and error definitions for the larkbridge chat bot.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the turn store,
//! the event guard, the completion engine, and the messaging platform
//! client. Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes the message pipeline testable
//! with in-process fakes.

pub mod completion;
pub mod error;
pub mod event;
pub mod messenger;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use completion::{CompletionEngine, CompletionRequest};
pub use error::{CompletionError, Error, MessengerError, Result, StoreError};
pub use event::{ChatKind, InboundEvent, Mention, MessageEvent};
pub use messenger::Messenger;
pub use store::{EventGuard, TurnStore};
pub use turn::{SessionId, Turn};
