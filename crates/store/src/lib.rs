//! Storage backends for larkbridge.
//!
//! Two implementations of the core `TurnStore` + `EventGuard` traits:
//! - `SqliteStore` — production backend, one SQLite file shared by every
//!   service instance.
//! - `InMemoryStore` — tests and ephemeral runs.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
