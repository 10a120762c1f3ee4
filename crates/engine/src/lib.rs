//! # taskswarm engine
//!
//! Sequences tasks against a streaming LLM:
//!
//! ```text
//! TaskManager ── pops a Task, renders its instructions, forks a context
//!     │
//!     ▼
//! StreamingDriver ── consumes the client's chunk stream
//!     │
//!     ▼
//! ToolCallAccumulator ── reassembles tool calls from fragments
//!     │
//!     ▼
//! TaskTool handlers ── results flow back into the parent context
//! ```

pub mod accumulator;
pub mod context;
pub mod driver;
pub mod event;
pub mod manager;
pub mod observer;
pub mod task;
pub mod template;

pub use accumulator::{InFlightCall, ToolCallAccumulator};
pub use context::{TaskExecutionContext, VariableBag};
pub use driver::StreamingDriver;
pub use event::TaskStreamEvent;
pub use manager::{EXECUTION_COMPLETE, TaskManager};
pub use observer::{ChannelObserver, TaskObserver, TracingObserver};
pub use task::{Task, TaskHandler, TaskResult, TaskTool};

pub use tokio_util::sync::CancellationToken;
