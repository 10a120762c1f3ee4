//! LLM client implementations for taskswarm.
//!
//! All clients implement the `taskswarm_core::LlmClient` trait and produce
//! raw chunk streams; tool-call assembly happens in the engine.

pub mod mock;
pub mod openai_compat;

pub use mock::{ScriptedClient, ScriptedTurn};
pub use openai_compat::OpenAiCompatClient;
