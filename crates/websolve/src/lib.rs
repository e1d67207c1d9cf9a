//! Public facade crate for `websolve`.
//!
//! No I/O or backend-specific logic lives here: it re-exports the collaborator types/traits
//! from `websolve-core` and the error-solution pipeline from `websolve-pipeline`.

pub use websolve_core::*;
pub use websolve_pipeline as pipeline;
pub use websolve_pipeline::{ErrorSolutionFinder, FinderConfig, SolutionReport};
