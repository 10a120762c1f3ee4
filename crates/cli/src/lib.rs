//! Library half of the `taskswarm` binary: built-in tools and pipeline
//! assembly, shared with the end-to-end tests.

pub mod builtin;
pub mod pipeline;
