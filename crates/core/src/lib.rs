//! # taskswarm core
//!
//! Domain types, traits, and error definitions for the taskswarm LLM task
//! orchestrator. This crate has **no framework dependencies**: it defines the
//! vocabulary that the engine, the providers and the CLI share.
//!
//! ## Design Philosophy
//!
//! Every boundary is a trait here (`LlmClient`, `StreamObserver`).
//! Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes scripted test doubles trivial.

pub mod error;
pub mod message;
pub mod observer;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ExecutionError, ProviderError, Result, ToolError};
pub use message::{Message, Role, ToolCallDelta, ToolCallRecord, Variables};
pub use observer::{NoopObserver, StreamObserver};
pub use provider::{
    ChunkChoice, ChunkStream, CompletionRequest, LlmClient, StreamChunk, ToolCallCompletion,
    ToolDefinition, Usage,
};
