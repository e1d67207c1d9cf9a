//! Error-solution pipeline: turn a raw error message into ranked candidate fixes.
//!
//! Collaborators (search, fetch) come in as `websolve_core` trait objects; this crate does
//! no network I/O of its own.

pub mod analyze;
pub mod config;
pub mod content;
pub mod finder;
pub mod queries;
pub mod signals;
pub mod tables;

pub use analyze::{AnalysisKind, AnalyzedResult, ResultAnalyzer};
pub use config::FinderConfig;
pub use content::{ContentProcessor, ScoredSolution, SourceKind};
pub use finder::{ErrorSolutionFinder, FindStats, SolutionReport};
pub use queries::{QueryBuilder, SearchTarget, TargetedQuery};
pub use signals::{ErrorParser, ErrorSignals, UNKNOWN_ERROR_KIND};
pub use tables::{CompiledTables, PatternTables};
