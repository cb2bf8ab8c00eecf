//! Messaging platform clients for larkbridge.
//!
//! One implementation: the Feishu/Lark open-platform client, replying to
//! messages over the IM v1 REST API with a cached tenant access token.

pub mod lark;

pub use lark::{LarkConfig, LarkMessenger};
