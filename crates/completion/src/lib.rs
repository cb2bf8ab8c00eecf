//! Completion engine implementations for larkbridge.
//!
//! Currently ships one engine: the OpenAI legacy completions API.

pub mod openai;

pub use openai::OpenAiEngine;
