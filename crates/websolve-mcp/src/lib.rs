//! `websolve` crate (library surface).
//!
//! The primary entrypoint is the `websolve` binary (CLI + MCP stdio). This module re-exports
//! the collaborator types and the error-solution pipeline for embedding.

pub use websolve_core as core;
pub use websolve_pipeline as pipeline;
